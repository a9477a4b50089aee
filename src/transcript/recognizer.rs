//! Speech recognizer boundary.
//!
//! The production recognizer spawns a streaming whisper-style binary that
//! emits one JSON object per stdout line (`{"text": "...", "final": bool}`).
//! Platforms without a configured recognizer report `Unavailable` and the
//! feed degrades to an empty transcript.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::RecognizerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// In-progress hypothesis; replaces the previous partial.
    Interim(String),
    /// Finalized utterance.
    Final(String),
    /// The underlying stream terminated on its own.
    Ended,
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
    #[error("recognizer failed to start: {0}")]
    StartFailed(String),
}

/// One live recognition stream. Dropping it (or calling `stop`) kills the
/// underlying recognizer.
pub struct RecognitionStream {
    pub events: mpsc::Receiver<RecognitionEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl RecognitionStream {
    pub fn new(events: mpsc::Receiver<RecognitionEvent>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for RecognitionStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self) -> Result<RecognitionStream, RecognitionError>;
}

/// Line format produced by the streaming recognizer binary.
#[derive(Debug, serde::Deserialize)]
struct RecognizerLine {
    text: String,
    #[serde(rename = "final", default)]
    is_final: bool,
}

pub struct WhisperStreamRecognizer {
    command: String,
    args: Vec<String>,
}

impl WhisperStreamRecognizer {
    /// Build from config. `Unavailable` when no recognizer command is
    /// configured or the binary cannot be found on PATH.
    pub fn from_config(config: &RecognizerConfig) -> Result<Self, RecognitionError> {
        let command = config
            .command
            .clone()
            .ok_or_else(|| RecognitionError::Unavailable("no recognizer configured".to_string()))?;

        let resolved = which::which(&command).map_err(|e| {
            RecognitionError::Unavailable(format!("recognizer '{}' not found: {}", command, e))
        })?;

        let mut args = config.args.clone();
        if let Some(model_path) = &config.model_path {
            args.push("--model".to_string());
            args.push(model_path.clone());
        }

        info!("Using streaming recognizer: {:?}", resolved);

        Ok(Self {
            command: resolved.to_string_lossy().into_owned(),
            args,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperStreamRecognizer {
    async fn start(&self) -> Result<RecognitionStream, RecognitionError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecognitionError::StartFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecognitionError::StartFailed("no stdout handle".to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("Recognizer stream stopped, killing child");
                        let _ = child.kill().await;
                        return;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<RecognizerLine>(line) {
                                Ok(parsed) => {
                                    let event = if parsed.is_final {
                                        RecognitionEvent::Final(parsed.text)
                                    } else {
                                        RecognitionEvent::Interim(parsed.text)
                                    };
                                    if events_tx.send(event).await.is_err() {
                                        let _ = child.kill().await;
                                        return;
                                    }
                                }
                                Err(e) => warn!("Unparseable recognizer line: {}", e),
                            }
                        }
                        // EOF or read error: the stream ended on its own.
                        Ok(None) | Err(_) => {
                            let _ = events_tx.send(RecognitionEvent::Ended).await;
                            let _ = child.wait().await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(RecognitionStream::new(events_rx, stop_tx))
    }
}
