use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub recognizer: RecognizerConfig,
    pub summarizer: SummarizerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate for captured and mixed audio.
    pub sample_rate: u32,
    /// Flush interval for the audio encoder and recording sink, in milliseconds.
    pub flush_interval_ms: u64,
    /// Command used to open a meeting URL before requesting devices.
    pub viewer_command: String,
    /// Screen recorder binary producing encoded video on stdout.
    pub screen_recorder: String,
    /// Extra arguments passed to the screen recorder.
    pub screen_recorder_args: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            flush_interval_ms: 1000,
            viewer_command: "xdg-open".to_string(),
            screen_recorder: "wf-recorder".to_string(),
            screen_recorder_args: vec!["--muxer=mp4".to_string(), "--file=-".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Streaming speech-to-text binary emitting one JSON event per line.
    /// Left unset, sessions run with an empty transcript.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Summarization service endpoint. Without it the Processing phase
    /// cannot reach Summary; the error is surfaced on the next status read.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Free-text context sent with every summary request.
    pub context_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3839 }
    }
}

impl Config {
    /// Load config from the config file, falling back to defaults when the
    /// file is missing.
    pub fn load() -> Result<Self> {
        let path = global::config_file()?;

        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.capture.sample_rate, 16000);
        assert_eq!(config.capture.flush_interval_ms, 1000);
        assert_eq!(config.api.port, 3839);
        assert!(config.recognizer.command.is_none());
        assert!(config.summarizer.endpoint.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [capture]
            sample_rate = 48000

            [summarizer]
            endpoint = "http://localhost:9000/summarize"
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.sample_rate, 48000);
        assert_eq!(config.capture.flush_interval_ms, 1000);
        assert_eq!(
            config.summarizer.endpoint.as_deref(),
            Some("http://localhost:9000/summarize")
        );
    }
}
