//! Recording sink: consumes the final encoded stream and finalizes the
//! session artifact.
//!
//! Chunks arriving within a flush interval are grouped into one buffered
//! chunk. `stop` concatenates everything buffered into a single artifact,
//! exactly once; repeated stops return the same artifact.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One encoded chunk from the capture composition step. Audio chunks carry
/// WAV bytes; video chunks pass through from the platform encoder opaque.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub bytes: Vec<u8>,
}

/// The finished recording. Both roles reference the same bytes so
/// downstream consumers that only need one of them stay simple.
#[derive(Debug, Clone)]
pub struct RecordedArtifact {
    bytes: Arc<Vec<u8>>,
}

impl RecordedArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    /// Combined audio+video role.
    pub fn combined(&self) -> &[u8] {
        &self.bytes
    }

    /// Video-only role, pointing at the same bytes.
    pub fn video_only(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Default)]
struct SinkInner {
    chunks: Vec<Vec<u8>>,
    pending: Vec<u8>,
    artifact: Option<RecordedArtifact>,
}

pub struct RecordingSink {
    inner: Arc<Mutex<SinkInner>>,
    running: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    flush_interval: Duration,
}

impl RecordingSink {
    pub fn new(flush_interval: Duration) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(SinkInner::default())),
            running,
            task: None,
            flush_interval,
        }
    }

    /// Begin consuming the final stream.
    pub fn start(&mut self, rx: mpsc::Receiver<EncodedChunk>) {
        if self.task.is_some() {
            warn!("Recording sink already started");
            return;
        }
        self.running.send_replace(true);

        let inner = Arc::clone(&self.inner);
        let running_rx = self.running.subscribe();
        self.task = Some(tokio::spawn(collect_task(
            rx,
            inner,
            running_rx,
            self.flush_interval,
        )));
        debug!("Recording sink started");
    }

    /// Finalize the artifact. The first call concatenates all buffered
    /// chunks; later calls return the same artifact. A sink that never
    /// started returns `None`.
    pub async fn stop(&mut self) -> Option<RecordedArtifact> {
        {
            let inner = self.inner.lock().await;
            if let Some(artifact) = &inner.artifact {
                debug!("Recording sink already finalized");
                return Some(artifact.clone());
            }
        }

        let task = self.task.take()?;
        self.running.send_replace(false);
        let _ = task.await;

        let mut inner = self.inner.lock().await;
        if !inner.pending.is_empty() {
            let pending = std::mem::take(&mut inner.pending);
            inner.chunks.push(pending);
        }
        let bytes: Vec<u8> = inner.chunks.concat();
        let artifact = RecordedArtifact::new(bytes);
        inner.artifact = Some(artifact.clone());

        info!(
            "Recording finalized: {} chunk(s), {} bytes",
            inner.chunks.len(),
            artifact.len()
        );
        Some(artifact)
    }

    /// Buffered chunk count, for status reporting.
    pub async fn chunk_count(&self) -> usize {
        self.inner.lock().await.chunks.len()
    }
}

async fn collect_task(
    mut rx: mpsc::Receiver<EncodedChunk>,
    inner: Arc<Mutex<SinkInner>>,
    mut running: watch::Receiver<bool>,
    flush_interval: Duration,
) {
    let mut interval = tokio::time::interval(flush_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(chunk) => inner.lock().await.pending.extend(chunk.bytes),
                None => break,
            },
            _ = interval.tick() => {
                let mut inner = inner.lock().await;
                if !inner.pending.is_empty() {
                    let pending = std::mem::take(&mut inner.pending);
                    inner.chunks.push(pending);
                }
            }
            changed = running.changed() => {
                if changed.is_err() || !*running.borrow() {
                    // Drain whatever already arrived before finalize.
                    let mut inner = inner.lock().await;
                    while let Ok(chunk) = rx.try_recv() {
                        inner.pending.extend(chunk.bytes);
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(bytes: &[u8]) -> EncodedChunk {
        EncodedChunk {
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_artifact_concatenates_chunks_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let mut sink = RecordingSink::new(Duration::from_millis(20));
        sink.start(rx);

        tx.send(chunk(b"abc")).await.unwrap();
        tx.send(chunk(b"def")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(chunk(b"ghi")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let artifact = sink.stop().await.unwrap();
        assert_eq!(artifact.combined(), b"abcdefghi");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_produces_one_artifact() {
        let (tx, rx) = mpsc::channel(8);
        let mut sink = RecordingSink::new(Duration::from_millis(20));
        sink.start(rx);

        tx.send(chunk(b"xyz")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let first = sink.stop().await.unwrap();
        let second = sink.stop().await.unwrap();
        assert_eq!(first.combined(), second.combined());
        assert_eq!(first.combined(), b"xyz");
    }

    #[tokio::test]
    async fn test_stop_before_start_is_a_no_op() {
        let mut sink = RecordingSink::new(Duration::from_millis(20));
        assert!(sink.stop().await.is_none());
    }

    #[tokio::test]
    async fn test_both_roles_reference_the_same_bytes() {
        let (tx, rx) = mpsc::channel(8);
        let mut sink = RecordingSink::new(Duration::from_millis(20));
        sink.start(rx);

        tx.send(chunk(b"media")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let artifact = sink.stop().await.unwrap();
        assert_eq!(artifact.combined(), artifact.video_only());
        assert_eq!(artifact.combined().as_ptr(), artifact.video_only().as_ptr());
    }
}
