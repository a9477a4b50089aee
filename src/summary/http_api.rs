//! HTTP summarization provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{SummaryRequest, SummaryResponse, Summarizer};

pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSummarizer {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        info!("Summarizer endpoint: {}", endpoint);
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse> {
        debug!(
            "Submitting summary request: {} transcript segment(s), {} highlight(s)",
            request.transcript.len(),
            request.highlights.len()
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach summarization service")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read summarization response body")?;

        if !status.is_success() {
            error!("Summarization failed with status {}: {}", status, body);
            anyhow::bail!("summarization service returned {}: {}", status, body);
        }

        let parsed: SummaryResponse =
            serde_json::from_str(&body).context("Failed to parse summarization response")?;

        Ok(parsed)
    }
}
