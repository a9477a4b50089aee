//! Session phase and shared status handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::clock::ClockHandle;

/// Top-level lifecycle phase. `Calendar` is idle/browsing; the session
/// machine is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Calendar,
    Recording,
    Processing,
    Summary,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Summary => "summary",
        }
    }
}

/// Point-in-time view for API handlers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub duration_seconds: u64,
    pub meeting_title: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
}

struct StatusInner {
    phase: SessionPhase,
    meeting_title: Option<String>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    last_error: Option<String>,
    clock: Option<ClockHandle>,
    final_duration: u64,
}

impl Default for StatusInner {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Calendar,
            meeting_title: None,
            started_at: None,
            last_error: None,
            clock: None,
            final_duration: 0,
        }
    }
}

/// Thread-safe handle shared between the session machine and API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<StatusInner>>,
}

impl SessionStatusHandle {
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        let duration_seconds = inner
            .clock
            .as_ref()
            .map(|clock| clock.seconds())
            .unwrap_or(inner.final_duration);

        SessionSnapshot {
            phase: inner.phase,
            duration_seconds,
            meeting_title: inner.meeting_title.clone(),
            started_at: inner.started_at,
            last_error: inner.last_error.clone(),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn start_recording(&self, meeting_title: String, clock: ClockHandle) {
        let mut inner = self.inner.lock().await;
        inner.phase = SessionPhase::Recording;
        inner.meeting_title = Some(meeting_title);
        inner.started_at = Some(chrono::Utc::now());
        inner.last_error = None;
        inner.clock = Some(clock);
        inner.final_duration = 0;
    }

    /// Recording → Processing; the duration freezes at the clock's final
    /// value.
    pub async fn stop_recording(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(clock) = inner.clock.take() {
            inner.final_duration = clock.seconds();
        }
        inner.phase = SessionPhase::Processing;
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        self.inner.lock().await.phase = phase;
    }

    /// Abandon the attempt: back to Calendar with a user-visible error.
    pub async fn fail(&self, error: String) {
        let mut inner = self.inner.lock().await;
        if let Some(clock) = inner.clock.take() {
            inner.final_duration = clock.seconds();
        }
        inner.phase = SessionPhase::Calendar;
        inner.last_error = Some(error);
    }

    /// Back to Calendar with nothing retained.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = StatusInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(SessionPhase::Calendar.as_str(), "calendar");
        assert_eq!(SessionPhase::Recording.as_str(), "recording");
        assert_eq!(SessionPhase::Processing.as_str(), "processing");
        assert_eq!(SessionPhase::Summary.as_str(), "summary");
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Recording).unwrap();
        assert_eq!(json, "\"recording\"");

        let parsed: SessionPhase = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, SessionPhase::Processing);
    }

    #[tokio::test]
    async fn test_snapshot_defaults_to_calendar() {
        let handle = SessionStatusHandle::default();
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Calendar);
        assert_eq!(snapshot.duration_seconds, 0);
        assert!(snapshot.meeting_title.is_none());
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_start_recording_sets_state() {
        let handle = SessionStatusHandle::default();
        handle
            .start_recording("Standup".to_string(), ClockHandle::default())
            .await;

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Recording);
        assert_eq!(snapshot.meeting_title.as_deref(), Some("Standup"));
        assert!(snapshot.started_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_returns_to_calendar_with_error() {
        let handle = SessionStatusHandle::default();
        handle
            .start_recording("Standup".to_string(), ClockHandle::default())
            .await;
        handle.fail("summarization failed".to_string()).await;

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Calendar);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("summarization failed")
        );
    }

    #[tokio::test]
    async fn test_lifecycle_phases() {
        let handle = SessionStatusHandle::default();

        handle
            .start_recording("Review".to_string(), ClockHandle::default())
            .await;
        assert_eq!(handle.phase().await, SessionPhase::Recording);

        handle.stop_recording().await;
        assert_eq!(handle.phase().await, SessionPhase::Processing);

        handle.set_phase(SessionPhase::Summary).await;
        assert_eq!(handle.phase().await, SessionPhase::Summary);

        handle.reset().await;
        assert_eq!(handle.phase().await, SessionPhase::Calendar);
    }
}
