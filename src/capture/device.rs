//! Device boundary: acquired media streams and the broker that grants them.
//!
//! A `MediaSourceHandle` is the only owner of an acquired device stream.
//! The capture orchestrator holds every handle for the session and releases
//! each exactly once during teardown, on every exit path.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::audio::AudioFrame;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// The operator refused the permission prompt.
    #[error("permission denied")]
    Denied,
    #[error("{0}")]
    Failed(String),
}

/// Start-sequence errors surfaced to the session machine.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Terminal for the attempt; the caller leaves Recording entirely.
    #[error("capture permission denied: {0}")]
    AcquisitionDenied(String),
    /// Any other start-sequence failure, after full rollback.
    #[error("capture start failed: {0}")]
    AcquisitionFailed(String),
}

/// Encoded video chunks plus an ended flag that flips when the platform
/// revokes the stream out-of-band (e.g. the operator stops screen sharing
/// from the OS chrome instead of the app).
pub struct VideoTrack {
    pub chunks: mpsc::Receiver<Vec<u8>>,
    pub ended: watch::Receiver<bool>,
}

pub struct MediaSourceHandle {
    label: String,
    audio: Option<mpsc::Receiver<AudioFrame>>,
    video: Option<VideoTrack>,
    releaser: Option<Box<dyn FnOnce() + Send>>,
    released: bool,
}

impl MediaSourceHandle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            audio: None,
            video: None,
            releaser: None,
            released: false,
        }
    }

    pub fn with_audio(mut self, frames: mpsc::Receiver<AudioFrame>) -> Self {
        self.audio = Some(frames);
        self
    }

    pub fn with_video(mut self, track: VideoTrack) -> Self {
        self.video = Some(track);
        self
    }

    /// Invoked on release to stop the device tracks behind this handle.
    pub fn with_releaser(mut self, releaser: impl FnOnce() + Send + 'static) -> Self {
        self.releaser = Some(Box::new(releaser));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The granted audio track, if any. Yields `None` on a second call or
    /// when the grant carried no audio.
    pub fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.audio.take()
    }

    pub fn take_video(&mut self) -> Option<VideoTrack> {
        self.video.take()
    }

    /// Stop all device tracks. Runs the underlying release at most once;
    /// repeated calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(releaser) = self.releaser.take() {
            releaser();
        }
        debug!("Released media source: {}", self.label);
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MediaSourceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Platform capture boundary. Implementations prompt for (or are refused)
/// the actual devices; tests inject fakes.
#[async_trait]
pub trait DeviceBroker: Send + Sync {
    /// Display/window stream: video plus, when granted, system audio.
    async fn acquire_display(&self) -> Result<MediaSourceHandle, AcquireError>;

    /// Microphone stream.
    async fn acquire_microphone(&self) -> Result<MediaSourceHandle, AcquireError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_release_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut handle =
            MediaSourceHandle::new("display").with_releaser(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        handle.release();
        handle.release();
        assert!(handle.is_released());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_unreleased_handle() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        {
            let _handle = MediaSourceHandle::new("microphone").with_releaser(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_audio_track_taken_once() {
        let (_tx, rx) = mpsc::channel::<AudioFrame>(1);
        let mut handle = MediaSourceHandle::new("microphone").with_audio(rx);
        assert!(handle.take_audio().is_some());
        assert!(handle.take_audio().is_none());
    }
}
