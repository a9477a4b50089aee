//! Clip review endpoints: two-phase capture, save, list, delete.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::timeline::ClipBookHandle;

#[derive(Clone)]
pub struct ClipState {
    pub clips: ClipBookHandle,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub position_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct SaveClipRequest {
    pub label: String,
}

pub fn router(state: ClipState) -> Router {
    Router::new()
        .route("/", get(list_clips))
        .route("/start", post(capture_start))
        .route("/end", post(capture_end))
        .route("/save", post(save_clip))
        .route("/:id", delete(delete_clip))
        .with_state(state)
}

async fn list_clips(State(state): State<ClipState>) -> Json<Value> {
    let clips = state.clips.clips().await;
    let (pending_start, pending_end) = state.clips.pending().await;
    Json(json!({
        "clips": clips,
        "pending_start": pending_start,
        "pending_end": pending_end,
    }))
}

async fn capture_start(
    State(state): State<ClipState>,
    Json(request): Json<PositionRequest>,
) -> Json<Value> {
    state.clips.capture_start(request.position_seconds).await;
    let (pending_start, pending_end) = state.clips.pending().await;
    Json(json!({
        "pending_start": pending_start,
        "pending_end": pending_end,
    }))
}

async fn capture_end(
    State(state): State<ClipState>,
    Json(request): Json<PositionRequest>,
) -> Json<Value> {
    state.clips.capture_end(request.position_seconds).await;
    let (pending_start, pending_end) = state.clips.pending().await;
    Json(json!({
        "pending_start": pending_start,
        "pending_end": pending_end,
    }))
}

async fn save_clip(
    State(state): State<ClipState>,
    Json(request): Json<SaveClipRequest>,
) -> ApiResult<Json<Value>> {
    match state.clips.save(&request.label).await {
        Some(clip) => Ok(Json(json!({ "saved": true, "clip": clip }))),
        // Incomplete range or empty label; saving is a validated no-op.
        None => Err(ApiError::bad_request(
            "clip needs a start, an end, and a non-empty label",
        )),
    }
}

async fn delete_clip(
    State(state): State<ClipState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.clips.delete(&id).await {
        Ok(Json(json!({ "deleted": true })))
    } else {
        Err(ApiError::not_found(format!("no clip with id {}", id)))
    }
}
