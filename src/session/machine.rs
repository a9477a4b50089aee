//! Session state machine.
//!
//! Calendar → Recording → Processing → Summary, with a cancel edge from
//! Recording and an error edge from Processing back to Calendar. The
//! machine is the sole decision point for user-visible transitions: the
//! capture orchestrator, feed, and sink absorb what they can and propagate
//! the rest exactly one level up to here.

use anyhow::{bail, Result};
use base64::Engine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureError, CaptureEvent, CaptureOrchestrator, RunningCapture};
use crate::meetings::Meeting;
use crate::recording::RecordedArtifact;
use crate::summary::{normalize, SummaryRequest, SummaryResult, Summarizer};
use crate::timeline::{Highlight, HighlightLog};
use crate::transcript::TranscriptStore;

use super::status::{SessionPhase, SessionStatusHandle};

pub struct SessionMachine {
    status: SessionStatusHandle,
    orchestrator: CaptureOrchestrator,
    summarizer: Arc<dyn Summarizer>,
    transcript: TranscriptStore,
    highlights: HighlightLog,
    context_text: String,
    events_tx: mpsc::Sender<CaptureEvent>,
    running: Option<RunningCapture>,
    last_summary: Option<SummaryResult>,
    artifact: Option<RecordedArtifact>,
}

impl SessionMachine {
    /// Returns the machine plus the capture event stream the service loop
    /// forwards back into `on_capture_event`.
    pub fn new(
        orchestrator: CaptureOrchestrator,
        summarizer: Arc<dyn Summarizer>,
        transcript: TranscriptStore,
        highlights: HighlightLog,
        status: SessionStatusHandle,
        context_text: String,
    ) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel(4);
        (
            Self {
                status,
                orchestrator,
                summarizer,
                transcript,
                highlights,
                context_text,
                events_tx,
                running: None,
                last_summary: None,
                artifact: None,
            },
            events_rx,
        )
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    /// Calendar → Recording. A denied or failed acquisition leaves the
    /// machine in Calendar with the error surfaced for the next render.
    pub async fn start(&mut self, meeting: Meeting) -> Result<()> {
        let phase = self.status.phase().await;
        if phase != SessionPhase::Calendar {
            bail!("cannot start a session while {}", phase.as_str());
        }

        info!("Starting capture for meeting '{}'", meeting.title);

        // Fresh session: the previous attempt's data is gone.
        self.transcript.clear().await;
        self.highlights.clear().await;
        self.last_summary = None;
        self.artifact = None;

        match self
            .orchestrator
            .start(&meeting.url, self.events_tx.clone())
            .await
        {
            Ok(running) => {
                self.status
                    .start_recording(meeting.title, running.clock_handle())
                    .await;
                self.running = Some(running);
                Ok(())
            }
            Err(e) => {
                match &e {
                    CaptureError::AcquisitionDenied(_) => error!("Capture denied: {}", e),
                    CaptureError::AcquisitionFailed(_) => error!("Capture failed: {}", e),
                }
                self.status.fail(e.to_string()).await;
                Err(e.into())
            }
        }
    }

    /// Recording → Processing → Summary (or back to Calendar on
    /// summarization failure). Safe under the operator-stop /
    /// device-revocation race: only the first caller past the phase guard
    /// runs the sequence.
    pub async fn stop(&mut self) -> Result<()> {
        let phase = self.status.phase().await;
        if phase != SessionPhase::Recording {
            debug!("Stop requested while {}; ignoring", phase.as_str());
            return Ok(());
        }

        let mut running = match self.running.take() {
            Some(running) => running,
            None => {
                warn!("Recording phase without a live capture; resetting");
                self.status.reset().await;
                return Ok(());
            }
        };

        self.status.stop_recording().await;
        running.stop().await;

        let Some(artifact) = running.finalize().await else {
            self.status
                .fail("recording produced no artifact".to_string())
                .await;
            return Ok(());
        };

        info!(
            "Recording stopped: {} bytes captured, handing off for summary",
            artifact.len()
        );

        let transcript = self.transcript.finals().await;
        let highlights = self.highlights.all().await;
        let request = SummaryRequest {
            artifact_base64: base64::engine::general_purpose::STANDARD.encode(artifact.combined()),
            context_text: self.context_text.clone(),
            transcript: transcript.clone(),
            highlights,
        };

        match self.summarizer.summarize(&request).await {
            Ok(raw) => {
                self.last_summary = Some(normalize(raw, transcript));
                self.artifact = Some(artifact);
                self.status.set_phase(SessionPhase::Summary).await;
                info!("Summary ready");
            }
            Err(e) => {
                // Attempt abandoned; no retry queue.
                error!("Summarization failed: {}", e);
                self.status.fail(format!("summarization failed: {}", e)).await;
            }
        }

        Ok(())
    }

    /// Recording → Calendar. Full teardown, nothing persisted.
    pub async fn cancel(&mut self) -> Result<()> {
        let phase = self.status.phase().await;
        if phase != SessionPhase::Recording {
            debug!("Cancel requested while {}; ignoring", phase.as_str());
            return Ok(());
        }

        if let Some(mut running) = self.running.take() {
            running.stop().await;
            let _ = running.finalize().await;
        }

        self.transcript.clear().await;
        self.highlights.clear().await;
        self.status.reset().await;
        info!("Session cancelled; nothing persisted");
        Ok(())
    }

    /// Mark a highlight at the current session duration. Only meaningful
    /// while recording; otherwise a no-op.
    pub async fn mark_highlight(&self) -> Option<Highlight> {
        if self.status.phase().await != SessionPhase::Recording {
            return None;
        }
        let now = self
            .running
            .as_ref()
            .map(|running| running.clock_handle().seconds())?;
        Some(self.highlights.mark(now).await)
    }

    /// Summary → Calendar, discarding the artifact and results.
    pub async fn close_summary(&mut self) -> Result<()> {
        let phase = self.status.phase().await;
        if phase != SessionPhase::Summary {
            debug!("Close requested while {}; ignoring", phase.as_str());
            return Ok(());
        }
        self.last_summary = None;
        self.artifact = None;
        self.status.reset().await;
        Ok(())
    }

    /// Out-of-band device revocation drives the identical stop path.
    pub async fn on_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::DeviceRevoked => {
                info!("Display stream revoked; stopping session");
                if let Err(e) = self.stop().await {
                    error!("Stop after revocation failed: {}", e);
                }
            }
        }
    }

    pub fn summary(&self) -> Option<&SummaryResult> {
        self.last_summary.as_ref()
    }

    /// The finished artifact, readable by the review/export step.
    pub fn artifact(&self) -> Option<&RecordedArtifact> {
        self.artifact.as_ref()
    }
}
