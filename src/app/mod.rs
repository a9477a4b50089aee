//! Service wiring: config → collaborators → session machine → API server
//! → command loop.

use crate::api::{ApiCommand, ApiServer};
use crate::capture::{CaptureOrchestrator, HostDevices};
use crate::config::Config;
use crate::session::{SessionMachine, SessionStatusHandle};
use crate::summary::summarizer_from_config;
use crate::timeline::{ClipBookHandle, HighlightLog};
use crate::transcript::{
    RecognitionError, SpeechRecognizer, TranscriptStore, WhisperStreamRecognizer,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting meetcap service");

    let config = Config::load()?;

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);

    let recognizer = match WhisperStreamRecognizer::from_config(&config.recognizer) {
        Ok(recognizer) => Some(Arc::new(recognizer) as Arc<dyn SpeechRecognizer>),
        Err(RecognitionError::Unavailable(why)) => {
            warn!("Speech recognition unavailable: {}; transcripts will be empty", why);
            None
        }
        Err(e) => {
            warn!("Recognizer initialization failed: {}; transcripts will be empty", e);
            None
        }
    };

    // Outlive any single session: they carry into the summary/review phase.
    let transcript = TranscriptStore::default();
    let highlights = HighlightLog::default();
    let clips = ClipBookHandle::default();
    let status = SessionStatusHandle::default();

    let devices = Arc::new(HostDevices::new(config.capture.clone()));
    let orchestrator = CaptureOrchestrator::new(
        devices,
        recognizer,
        transcript.clone(),
        config.capture.clone(),
    );
    let summarizer = summarizer_from_config(&config.summarizer);

    let (mut machine, mut capture_events) = SessionMachine::new(
        orchestrator,
        summarizer,
        transcript.clone(),
        highlights.clone(),
        status.clone(),
        config.summarizer.context_text.clone(),
    );

    let api_server = ApiServer::new(tx, status, transcript, highlights, clips, &config);
    let port = config.api.port;
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("meetcap is ready");
    info!(
        "Start a session: curl -X POST http://127.0.0.1:{}/session/start -H 'Content-Type: application/json' -d @meeting.json",
        port
    );

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => handle_command(&mut machine, command).await,
                None => break,
            },
            event = capture_events.recv() => {
                if let Some(event) = event {
                    machine.on_capture_event(event).await;
                }
            }
        }
    }

    Ok(())
}

async fn handle_command(machine: &mut SessionMachine, command: ApiCommand) {
    match command {
        ApiCommand::StartSession(meeting) => {
            if let Err(e) = machine.start(meeting).await {
                error!("Failed to start session: {}", e);
            }
        }
        ApiCommand::StopSession => {
            if let Err(e) = machine.stop().await {
                error!("Failed to stop session: {}", e);
            }
        }
        ApiCommand::CancelSession => {
            if let Err(e) = machine.cancel().await {
                error!("Failed to cancel session: {}", e);
            }
        }
        ApiCommand::MarkHighlight => match machine.mark_highlight().await {
            Some(highlight) => info!("Highlight marked at {}s", highlight.timestamp_seconds),
            None => warn!("Highlight ignored outside of recording"),
        },
        ApiCommand::CloseSummary => {
            if let Err(e) = machine.close_summary().await {
                error!("Failed to close summary: {}", e);
            }
        }
    }
}
