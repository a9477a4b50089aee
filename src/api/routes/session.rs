//! Session control endpoints.
//!
//! Operator actions enqueue commands to the service loop; reads go
//! straight through the shared status handle and stores.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::meetings::Meeting;
use crate::session::SessionStatusHandle;
use crate::timeline::HighlightLog;
use crate::transcript::TranscriptStore;

/// Commands consumed by the service loop.
#[derive(Debug, Clone)]
pub enum ApiCommand {
    StartSession(Meeting),
    StopSession,
    CancelSession,
    MarkHighlight,
    CloseSummary,
}

#[derive(Clone)]
pub struct SessionState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: SessionStatusHandle,
    pub transcript: TranscriptStore,
    pub highlights: HighlightLog,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .route("/session/cancel", post(cancel_session))
        .route("/session/highlight", post(mark_highlight))
        .route("/session/status", get(session_status))
        .route("/session/transcript", get(session_transcript))
        .route("/summary/close", post(close_summary))
        .with_state(state)
}

async fn send_command(state: &SessionState, command: ApiCommand) -> ApiResult<Json<Value>> {
    state
        .tx
        .send(command)
        .await
        .map_err(|e| ApiError::internal(format!("service loop unavailable: {}", e)))?;

    // Small delay so the status reflects the command.
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let snapshot = state.status.snapshot().await;
    Ok(Json(json!({
        "success": true,
        "phase": snapshot.phase.as_str(),
        "last_error": snapshot.last_error,
    })))
}

async fn start_session(
    State(state): State<SessionState>,
    Json(meeting): Json<Meeting>,
) -> ApiResult<Json<Value>> {
    info!("Start session requested for meeting '{}'", meeting.title);
    send_command(&state, ApiCommand::StartSession(meeting)).await
}

async fn stop_session(State(state): State<SessionState>) -> ApiResult<Json<Value>> {
    info!("Stop session requested via API");
    send_command(&state, ApiCommand::StopSession).await
}

async fn cancel_session(State(state): State<SessionState>) -> ApiResult<Json<Value>> {
    info!("Cancel session requested via API");
    send_command(&state, ApiCommand::CancelSession).await
}

async fn mark_highlight(State(state): State<SessionState>) -> ApiResult<Json<Value>> {
    send_command(&state, ApiCommand::MarkHighlight).await
}

async fn close_summary(State(state): State<SessionState>) -> ApiResult<Json<Value>> {
    send_command(&state, ApiCommand::CloseSummary).await
}

async fn session_status(State(state): State<SessionState>) -> Json<Value> {
    let snapshot = state.status.snapshot().await;
    let transcript_segments = state.transcript.len().await;
    let highlights = state.highlights.all().await;

    Json(json!({
        "phase": snapshot.phase.as_str(),
        "duration_seconds": snapshot.duration_seconds,
        "meeting_title": snapshot.meeting_title,
        "started_at": snapshot.started_at,
        "transcript_segments": transcript_segments,
        "highlights": highlights.len(),
        "last_error": snapshot.last_error,
    }))
}

async fn session_transcript(State(state): State<SessionState>) -> Json<Value> {
    let segments = state.transcript.segments().await;
    Json(json!({ "segments": segments }))
}
