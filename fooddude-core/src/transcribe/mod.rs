//! Speech-to-text adapters.
//!
//! The pipeline only depends on the [`Transcriber`] trait; the concrete
//! backend is chosen from [`TranscriptionSettings`] at startup.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use http::{OpenAiTranscriber, VoiceServerTranscriber};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error("Transcription service is rate limiting requests")]
    RateLimited,

    #[error("Could not reach transcription service: {0}")]
    NetworkError(String),

    #[error("Transcription service error: {0}")]
    ServiceError(String),
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Converts recorded audio to text. Failures are returned as-is; callers
    /// decide whether to prompt again.
    async fn transcribe(&self, audio: &[u8], mime_hint: &str) -> Result<String, TranscriptionError>;

    fn backend_label(&self) -> &'static str {
        "unknown"
    }
}

/// Backend used when voice input is turned off.
#[derive(Debug, Clone, Default)]
pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _audio: &[u8], _mime_hint: &str) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::ServiceError(
            "voice transcription is disabled in the configuration".to_string(),
        ))
    }

    fn backend_label(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptionBackend {
    /// FoodDude speech relay: JSON `{audioBase64, mimeType}` → `{text}`.
    #[default]
    VoiceServer,
    /// OpenAI-compatible `/v1/audio/transcriptions` endpoint.
    Openai,
    Disabled,
}

/// Transcription section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub backend: TranscriptionBackend,
    /// Base URL of the service.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound for one transcription request, in seconds. 0 disables it.
    pub timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            backend: TranscriptionBackend::VoiceServer,
            url: "http://localhost:4000".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Builds the configured transcription backend.
pub fn build_transcriber(settings: &TranscriptionSettings) -> Arc<dyn Transcriber> {
    match settings.backend {
        TranscriptionBackend::VoiceServer => Arc::new(VoiceServerTranscriber::new(&settings.url)),
        TranscriptionBackend::Openai => Arc::new(OpenAiTranscriber::new(
            &settings.url,
            settings.api_key.clone().unwrap_or_default(),
            &settings.model,
        )),
        TranscriptionBackend::Disabled => Arc::new(DisabledTranscriber),
    }
}
