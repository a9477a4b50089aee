//! Accumulated transcript, shared between the feed and readers.
//!
//! Finalized segments are append-only and never rewritten. At most one
//! non-final segment exists at a time; interim results replace it wholesale.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub timestamp_seconds: u64,
    pub text: String,
    pub is_final: bool,
}

#[derive(Debug, Default)]
struct TranscriptInner {
    finals: Vec<TranscriptSegment>,
    partial: Option<TranscriptSegment>,
}

/// Thread-safe handle onto the transcript. Mutated only by the
/// transcription feed; read by status handlers and the summary request.
#[derive(Clone, Default)]
pub struct TranscriptStore {
    inner: Arc<Mutex<TranscriptInner>>,
}

impl TranscriptStore {
    /// Append a finalized segment and clear the in-progress partial.
    /// Timestamps never go backwards even if a stamp arrives late.
    pub async fn append_final(&self, timestamp_seconds: u64, text: String) {
        let mut inner = self.inner.lock().await;
        let timestamp_seconds = inner
            .finals
            .last()
            .map(|last| last.timestamp_seconds.max(timestamp_seconds))
            .unwrap_or(timestamp_seconds);

        inner.finals.push(TranscriptSegment {
            timestamp_seconds,
            text,
            is_final: true,
        });
        inner.partial = None;
    }

    /// Replace the in-progress partial segment wholesale.
    pub async fn set_partial(&self, timestamp_seconds: u64, text: String) {
        let mut inner = self.inner.lock().await;
        inner.partial = Some(TranscriptSegment {
            timestamp_seconds,
            text,
            is_final: false,
        });
    }

    pub async fn clear_partial(&self) {
        self.inner.lock().await.partial = None;
    }

    /// All finalized segments, in append order.
    pub async fn finals(&self) -> Vec<TranscriptSegment> {
        self.inner.lock().await.finals.clone()
    }

    /// Finalized segments followed by the partial, if one is in progress.
    pub async fn segments(&self) -> Vec<TranscriptSegment> {
        let inner = self.inner.lock().await;
        let mut segments = inner.finals.clone();
        if let Some(partial) = &inner.partial {
            segments.push(partial.clone());
        }
        segments
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.finals.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reset for a new session.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.finals.clear();
        inner.partial = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_final_append_clears_partial() {
        let store = TranscriptStore::default();
        store.set_partial(3, "let's get sta".to_string()).await;
        store.append_final(4, "let's get started".to_string()).await;

        let segments = store.segments().await;
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_final);
        assert_eq!(segments[0].text, "let's get started");
    }

    #[tokio::test]
    async fn test_at_most_one_partial() {
        let store = TranscriptStore::default();
        store.set_partial(1, "hel".to_string()).await;
        store.set_partial(1, "hello eve".to_string()).await;
        store.set_partial(2, "hello everyone".to_string()).await;

        let segments = store.segments().await;
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].is_final);
        assert_eq!(segments[0].text, "hello everyone");
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing() {
        let store = TranscriptStore::default();
        store.append_final(5, "first".to_string()).await;
        store.append_final(3, "late stamp".to_string()).await;
        store.append_final(7, "third".to_string()).await;

        let finals = store.finals().await;
        let stamps: Vec<u64> = finals.iter().map(|s| s.timestamp_seconds).collect();
        assert_eq!(stamps, vec![5, 5, 7]);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_finals_never_rewritten() {
        let store = TranscriptStore::default();
        store.append_final(1, "one".to_string()).await;
        store.append_final(2, "two".to_string()).await;
        store.set_partial(3, "thr".to_string()).await;

        let finals = store.finals().await;
        assert_eq!(finals[0].text, "one");
        assert_eq!(finals[1].text, "two");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let store = TranscriptStore::default();
        store.append_final(1, "one".to_string()).await;
        store.set_partial(2, "tw".to_string()).await;
        store.clear().await;

        assert!(store.is_empty().await);
        assert!(store.segments().await.is_empty());
    }
}
