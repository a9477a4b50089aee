//! Highlights marked during live capture and clips defined afterwards.
//!
//! Highlights are instants stamped from the session clock, append-only
//! while recording and immutable after. Clips are named ranges built during
//! review from two captured playback positions; the watchdog bounds clip
//! playback on the external player.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const HIGHLIGHT_LABEL: &str = "Important";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub timestamp_seconds: u64,
    pub label: String,
}

/// Append-only log of operator marks. Rapid repeated marks all land;
/// nothing is deduplicated.
#[derive(Clone, Default)]
pub struct HighlightLog {
    inner: Arc<Mutex<Vec<Highlight>>>,
}

impl HighlightLog {
    pub async fn mark(&self, now_seconds: u64) -> Highlight {
        let highlight = Highlight {
            timestamp_seconds: now_seconds,
            label: HIGHLIGHT_LABEL.to_string(),
        };
        self.inner.lock().await.push(highlight.clone());
        debug!("Highlight marked at {}s", now_seconds);
        highlight
    }

    pub async fn all(&self) -> Vec<Highlight> {
        self.inner.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub label: String,
    pub start_seconds: u64,
    pub end_seconds: u64,
}

/// Two-phase clip builder over captured playback positions.
///
/// `save` commits only when start, end, and a non-empty label are all
/// present; the caller is responsible for the UI affordance, this type for
/// the validation. A start re-captured past a pending end clears the stale
/// end; an end captured with no start pending is merely incomplete.
#[derive(Debug, Default)]
pub struct ClipBook {
    pending_start: Option<u64>,
    pending_end: Option<u64>,
    clips: Vec<Clip>,
}

impl ClipBook {
    pub fn capture_start(&mut self, position_seconds: u64) {
        if self
            .pending_end
            .map_or(false, |end| end < position_seconds)
        {
            debug!("Clearing stale clip end before new start at {}s", position_seconds);
            self.pending_end = None;
        }
        self.pending_start = Some(position_seconds);
    }

    pub fn capture_end(&mut self, position_seconds: u64) {
        self.pending_end = Some(position_seconds);
    }

    pub fn pending(&self) -> (Option<u64>, Option<u64>) {
        (self.pending_start, self.pending_end)
    }

    /// Commit the pending range under `label`. No-op unless start, end,
    /// and a non-empty label are all present and `start ≤ end`.
    pub fn save(&mut self, label: &str) -> Option<Clip> {
        let label = label.trim();
        let (start_seconds, end_seconds) = match (self.pending_start, self.pending_end) {
            (Some(start), Some(end)) if !label.is_empty() && start <= end => (start, end),
            _ => return None,
        };

        let clip = Clip {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.to_string(),
            start_seconds,
            end_seconds,
        };
        self.clips.push(clip.clone());
        self.pending_start = None;
        self.pending_end = None;

        debug!(
            "Clip saved: '{}' {}s..{}s",
            clip.label, clip.start_seconds, clip.end_seconds
        );
        Some(clip)
    }

    /// Remove a clip by identity. Other clips keep their ids and order.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.clips.len();
        self.clips.retain(|clip| clip.id != id);
        self.clips.len() != before
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn get(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn clear(&mut self) {
        self.pending_start = None;
        self.pending_end = None;
        self.clips.clear();
    }
}

/// Shared handle for API handlers and the review layer.
#[derive(Clone, Default)]
pub struct ClipBookHandle {
    inner: Arc<Mutex<ClipBook>>,
}

impl ClipBookHandle {
    pub async fn capture_start(&self, position_seconds: u64) {
        self.inner.lock().await.capture_start(position_seconds);
    }

    pub async fn capture_end(&self, position_seconds: u64) {
        self.inner.lock().await.capture_end(position_seconds);
    }

    pub async fn save(&self, label: &str) -> Option<Clip> {
        self.inner.lock().await.save(label)
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.inner.lock().await.delete(id)
    }

    pub async fn clips(&self) -> Vec<Clip> {
        self.inner.lock().await.clips().to_vec()
    }

    pub async fn pending(&self) -> (Option<u64>, Option<u64>) {
        self.inner.lock().await.pending()
    }
}

/// Seek/stop surface of the external player.
pub trait PlaybackControl {
    fn seek(&mut self, position_seconds: u64);
    fn stop(&mut self);
}

/// Bounds clip playback: armed on `play`, it stops the player once the
/// position reaches the clip end. A manual seek disarms it without
/// stopping — manual navigation always overrides clip-bounded playback.
#[derive(Debug, Default)]
pub struct ClipWatchdog {
    armed_end: Option<u64>,
}

impl ClipWatchdog {
    pub fn play(&mut self, clip: &Clip, player: &mut dyn PlaybackControl) {
        player.seek(clip.start_seconds);
        self.armed_end = Some(clip.end_seconds);
    }

    /// Feed every player position update through here.
    pub fn on_position(&mut self, position_seconds: u64, player: &mut dyn PlaybackControl) {
        if let Some(end) = self.armed_end {
            if position_seconds >= end {
                player.stop();
                self.armed_end = None;
            }
        }
    }

    pub fn on_manual_seek(&mut self) {
        self.armed_end = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rapid_marks_all_recorded() {
        let log = HighlightLog::default();
        log.mark(7).await;
        log.mark(7).await;
        log.mark(7).await;

        let marks = log.all().await;
        assert_eq!(marks.len(), 3);
        assert!(marks.iter().all(|h| h.label == "Important"));
        assert!(marks.iter().all(|h| h.timestamp_seconds == 7));
    }

    #[test]
    fn test_save_requires_start_end_and_label() {
        let mut book = ClipBook::default();
        book.capture_start(3);
        book.capture_end(3);
        assert!(book.save("").is_none());
        assert!(book.save("   ").is_none());

        let clip = book.save("Budget").expect("complete clip commits");
        assert_eq!(clip.start_seconds, 3);
        assert_eq!(clip.end_seconds, 3);
        assert_eq!(clip.label, "Budget");
    }

    #[test]
    fn test_save_commits_captured_range() {
        let mut book = ClipBook::default();
        book.capture_start(12);
        book.capture_end(47);

        let clip = book.save("Budget Discussion").unwrap();
        assert_eq!(clip.start_seconds, 12);
        assert_eq!(clip.end_seconds, 47);
        assert_eq!(clip.label, "Budget Discussion");
        // Pending state is consumed by the commit.
        assert_eq!(book.pending(), (None, None));
    }

    #[test]
    fn test_start_recaptured_past_end_clears_stale_end() {
        let mut book = ClipBook::default();
        book.capture_start(10);
        book.capture_end(30);
        book.capture_start(50);

        assert_eq!(book.pending(), (Some(50), None));
        assert!(book.save("Stale").is_none());
    }

    #[test]
    fn test_end_without_start_is_incomplete_not_an_error() {
        let mut book = ClipBook::default();
        book.capture_end(30);
        assert_eq!(book.pending(), (None, Some(30)));
        assert!(book.save("No start yet").is_none());
    }

    #[test]
    fn test_delete_leaves_other_clips_untouched() {
        let mut book = ClipBook::default();
        book.capture_start(0);
        book.capture_end(5);
        let c1 = book.save("one").unwrap();
        book.capture_start(10);
        book.capture_end(15);
        let c2 = book.save("two").unwrap();
        book.capture_start(20);
        book.capture_end(25);
        let c3 = book.save("three").unwrap();

        assert!(book.delete(&c2.id));
        let remaining = book.clips();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], c1);
        assert_eq!(remaining[1], c3);
        assert!(!book.delete(&c2.id));
    }

    #[derive(Default)]
    struct FakePlayer {
        position: u64,
        stopped: bool,
    }

    impl PlaybackControl for FakePlayer {
        fn seek(&mut self, position_seconds: u64) {
            self.position = position_seconds;
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    #[test]
    fn test_watchdog_stops_playback_at_clip_end() {
        let clip = Clip {
            id: "c".to_string(),
            label: "range".to_string(),
            start_seconds: 10,
            end_seconds: 20,
        };
        let mut watchdog = ClipWatchdog::default();
        let mut player = FakePlayer::default();

        watchdog.play(&clip, &mut player);
        assert_eq!(player.position, 10);
        assert!(watchdog.is_armed());

        watchdog.on_position(15, &mut player);
        assert!(!player.stopped);

        watchdog.on_position(20, &mut player);
        assert!(player.stopped);
        assert!(!watchdog.is_armed());
    }

    #[test]
    fn test_manual_seek_disarms_without_stopping() {
        let clip = Clip {
            id: "c".to_string(),
            label: "range".to_string(),
            start_seconds: 10,
            end_seconds: 20,
        };
        let mut watchdog = ClipWatchdog::default();
        let mut player = FakePlayer::default();

        watchdog.play(&clip, &mut player);
        watchdog.on_manual_seek();
        assert!(!watchdog.is_armed());

        // Position passing the old end no longer stops anything.
        watchdog.on_position(25, &mut player);
        assert!(!player.stopped);
    }
}
