//! Summarization boundary.
//!
//! The backend is an opaque request/response service. Every response field
//! is optional on the wire; normalization fills omissions with documented
//! defaults and always overwrites the transcript with the locally-held one,
//! so transcript display never depends on backend fidelity.

pub mod http_api;

pub use http_api::HttpSummarizer;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::timeline::Highlight;
use crate::transcript::TranscriptSegment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Tense,
    Energetic,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub artifact_base64: String,
    pub context_text: String,
    pub transcript: Vec<TranscriptSegment>,
    pub highlights: Vec<Highlight>,
}

/// Raw wire response. Everything optional from the collaborator's side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SummaryResponse {
    pub summary_text: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub action_items: Option<Vec<String>>,
    pub attendees_detected: Option<Vec<String>>,
    pub sentiment: Option<Sentiment>,
    pub follow_up_email: Option<String>,
}

/// Normalized result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub summary_text: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub attendees_detected: Vec<String>,
    pub sentiment: Sentiment,
    pub follow_up_email: String,
    pub transcript: Vec<TranscriptSegment>,
}

/// Fill every omitted field with its default and overwrite `transcript`
/// with the transcript from the request, never the backend's.
pub fn normalize(raw: SummaryResponse, transcript: Vec<TranscriptSegment>) -> SummaryResult {
    SummaryResult {
        summary_text: raw.summary_text.unwrap_or_default(),
        key_points: raw.key_points.unwrap_or_default(),
        action_items: raw.action_items.unwrap_or_default(),
        attendees_detected: raw.attendees_detected.unwrap_or_default(),
        sentiment: raw.sentiment.unwrap_or_default(),
        follow_up_email: raw.follow_up_email.unwrap_or_default(),
        transcript,
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse>;
}

/// Build the configured summarizer. Without an endpoint every summarize
/// call fails, which surfaces through the Processing → Calendar error edge.
pub fn summarizer_from_config(config: &crate::config::SummarizerConfig) -> std::sync::Arc<dyn Summarizer> {
    match &config.endpoint {
        Some(endpoint) => std::sync::Arc::new(HttpSummarizer::new(
            endpoint.clone(),
            config.api_key.clone(),
        )),
        None => std::sync::Arc::new(UnconfiguredSummarizer),
    }
}

pub struct UnconfiguredSummarizer;

#[async_trait]
impl Summarizer for UnconfiguredSummarizer {
    async fn summarize(&self, _request: &SummaryRequest) -> Result<SummaryResponse> {
        anyhow::bail!("no summarizer endpoint configured")
    }
}
