//! REST API server for meetcap.
//!
//! Provides HTTP endpoints for:
//! - Session control (start, stop, cancel, highlight, close)
//! - Session status and live transcript
//! - Clip review (capture, save, list, delete)

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::session::SessionStatusHandle;
use crate::timeline::{ClipBookHandle, HighlightLog};
use crate::transcript::TranscriptStore;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::clips::ClipState;
pub use routes::session::{ApiCommand, SessionState};

pub struct ApiServer {
    port: u16,
    session_state: SessionState,
    clip_state: ClipState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        status: SessionStatusHandle,
        transcript: TranscriptStore,
        highlights: HighlightLog,
        clips: ClipBookHandle,
        config: &Config,
    ) -> Self {
        Self {
            port: config.api.port,
            session_state: SessionState {
                tx,
                status,
                transcript,
                highlights,
            },
            clip_state: ClipState { clips },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::session::router(self.session_state))
            .nest("/clips", routes::clips::router(self.clip_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET    /                   - Service info");
        info!("  GET    /version            - Version info");
        info!("  POST   /session/start      - Start capture for a meeting");
        info!("  POST   /session/stop       - Stop and summarize");
        info!("  POST   /session/cancel     - Abort without persisting");
        info!("  POST   /session/highlight  - Mark a highlight");
        info!("  GET    /session/status     - Session status");
        info!("  GET    /session/transcript - Live transcript");
        info!("  POST   /summary/close      - Discard summary, back to calendar");
        info!("  GET    /clips              - List clips");
        info!("  POST   /clips/start        - Capture clip start position");
        info!("  POST   /clips/end          - Capture clip end position");
        info!("  POST   /clips/save         - Save the pending clip");
        info!("  DELETE /clips/:id          - Delete a clip");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetcap",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetcap"
    }))
}
