//! Live transcription feed.
//!
//! Wraps a continuous recognition stream: interim results replace the
//! in-progress partial, finalized results are stamped with the current
//! session clock value and appended to the transcript. While the feed is
//! logically Listening, a recognition stream that terminates on its own
//! (platform limits, silence timeouts) is restarted automatically.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::ClockHandle;

use super::recognizer::{RecognitionError, RecognitionEvent, SpeechRecognizer};
use super::store::TranscriptStore;

const RESTART_DELAY: Duration = Duration::from_millis(500);

pub struct TranscriptionFeed {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    store: TranscriptStore,
    clock: ClockHandle,
    listening: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TranscriptionFeed {
    /// `recognizer: None` builds a feed that degrades to a no-op producer:
    /// the session proceeds with an empty transcript.
    pub fn new(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        store: TranscriptStore,
        clock: ClockHandle,
    ) -> Self {
        let (listening, _) = watch::channel(false);
        Self {
            recognizer,
            store,
            clock,
            listening,
            task: Mutex::new(None),
        }
    }

    /// Move to Listening and start consuming recognition events. Starting
    /// an already-listening feed is swallowed, not surfaced.
    pub async fn start(&self) {
        if *self.listening.borrow() {
            debug!("Transcription feed already listening");
            return;
        }
        self.listening.send_replace(true);

        let recognizer = match &self.recognizer {
            Some(recognizer) => Arc::clone(recognizer),
            None => {
                info!("No speech recognizer available; transcript will be empty");
                return;
            }
        };

        let store = self.store.clone();
        let clock = self.clock.clone();
        let listening_rx = self.listening.subscribe();

        let handle = tokio::spawn(run_loop(recognizer, store, clock, listening_rx));
        *self.task.lock().await = Some(handle);
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    /// Move to Stopped and kill the active recognition stream. Idempotent.
    pub async fn stop(&self) {
        if !*self.listening.borrow() {
            return;
        }
        self.listening.send_replace(false);

        if let Some(task) = self.task.lock().await.take() {
            // The loop observes the watch flag and exits; abort covers a
            // stream blocked without events.
            task.abort();
        }
        debug!("Transcription feed stopped");
    }
}

async fn run_loop(
    recognizer: Arc<dyn SpeechRecognizer>,
    store: TranscriptStore,
    clock: ClockHandle,
    mut listening: watch::Receiver<bool>,
) {
    while *listening.borrow() {
        let mut stream = match recognizer.start().await {
            Ok(stream) => stream,
            Err(RecognitionError::Unavailable(why)) => {
                info!("Speech recognition unavailable ({}); transcript disabled", why);
                return;
            }
            Err(e) => {
                warn!("Recognizer start failed: {}; retrying", e);
                tokio::time::sleep(RESTART_DELAY).await;
                continue;
            }
        };

        debug!("Recognition stream listening");

        loop {
            tokio::select! {
                changed = listening.changed() => {
                    if changed.is_err() || !*listening.borrow() {
                        stream.stop();
                        return;
                    }
                }
                event = stream.events.recv() => match event {
                    Some(RecognitionEvent::Interim(text)) => {
                        store.set_partial(clock.seconds(), text).await;
                    }
                    Some(RecognitionEvent::Final(text)) => {
                        if text.trim().is_empty() {
                            store.clear_partial().await;
                        } else {
                            store.append_final(clock.seconds(), text).await;
                        }
                    }
                    Some(RecognitionEvent::Ended) | None => break,
                }
            }
        }

        if *listening.borrow() {
            warn!("Recognition stream ended while listening; restarting");
            tokio::time::sleep(RESTART_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::{mpsc, oneshot};

    use crate::transcript::recognizer::RecognitionStream;

    /// Plays back pre-scripted streams, one per `start` call. After the
    /// scripts run out, `start` blocks forever on an empty stream.
    struct ScriptedRecognizer {
        scripts: StdMutex<Vec<Vec<RecognitionEvent>>>,
        starts: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new(scripts: Vec<Vec<RecognitionEvent>>) -> Self {
            Self {
                scripts: StdMutex::new(scripts),
                starts: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn start_count(&self) -> usize {
            self.starts.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn start(&self) -> Result<RecognitionStream, RecognitionError> {
            self.starts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.is_empty() {
                    Vec::new()
                } else {
                    scripts.remove(0)
                }
            };

            let (events_tx, events_rx) = mpsc::channel(16);
            let (stop_tx, _stop_rx) = oneshot::channel();
            tokio::spawn(async move {
                for event in script {
                    if events_tx.send(event).await.is_err() {
                        return;
                    }
                }
                // Keep the channel open; an empty script never ends.
                std::future::pending::<()>().await;
            });

            Ok(RecognitionStream::new(events_rx, stop_tx))
        }
    }

    struct UnavailableRecognizer;

    #[async_trait]
    impl SpeechRecognizer for UnavailableRecognizer {
        async fn start(&self) -> Result<RecognitionStream, RecognitionError> {
            Err(RecognitionError::Unavailable("no platform support".to_string()))
        }
    }

    #[tokio::test]
    async fn test_finals_append_and_clear_partial() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![vec![
            RecognitionEvent::Interim("hel".to_string()),
            RecognitionEvent::Interim("hello every".to_string()),
            RecognitionEvent::Final("hello everyone".to_string()),
        ]]));
        let store = TranscriptStore::default();
        let feed = TranscriptionFeed::new(Some(recognizer), store.clone(), ClockHandle::default());

        feed.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let segments = store.segments().await;
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_final);
        assert_eq!(segments[0].text, "hello everyone");

        feed.stop().await;
    }

    #[tokio::test]
    async fn test_spontaneous_end_restarts_stream() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            vec![
                RecognitionEvent::Final("before the drop".to_string()),
                RecognitionEvent::Ended,
            ],
            vec![RecognitionEvent::Final("after the restart".to_string())],
        ]));
        let store = TranscriptStore::default();
        let feed = TranscriptionFeed::new(
            Some(Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>),
            store.clone(),
            ClockHandle::default(),
        );

        feed.start().await;
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert!(recognizer.start_count() >= 2, "stream was not restarted");
        let texts: Vec<String> = store.finals().await.into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["before the drop", "after the restart"]);

        feed.stop().await;
    }

    #[tokio::test]
    async fn test_start_while_listening_is_swallowed() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![Vec::new()]));
        let feed = TranscriptionFeed::new(
            Some(Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>),
            TranscriptStore::default(),
            ClockHandle::default(),
        );

        feed.start().await;
        feed.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(recognizer.start_count(), 1);
        feed.stop().await;
    }

    #[tokio::test]
    async fn test_unavailable_recognizer_degrades_to_empty_transcript() {
        let store = TranscriptStore::default();
        let feed = TranscriptionFeed::new(
            Some(Arc::new(UnavailableRecognizer)),
            store.clone(),
            ClockHandle::default(),
        );

        feed.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.is_empty().await);
        feed.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let feed = TranscriptionFeed::new(None, TranscriptStore::default(), ClockHandle::default());
        feed.start().await;
        assert!(feed.is_listening());
        feed.stop().await;
        feed.stop().await;
        assert!(!feed.is_listening());
    }
}
