use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{Transcriber, TranscriptionError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    audio_base64: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct TextResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the FoodDude speech relay (`POST /transcribe`).
#[derive(Debug, Clone)]
pub struct VoiceServerTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl VoiceServerTranscriber {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/transcribe", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for VoiceServerTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_hint: &str) -> Result<String, TranscriptionError> {
        let body = RelayRequest {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
            mime_type: mime_hint,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        read_text(response).await
    }

    fn backend_label(&self) -> &'static str {
        "voice-server"
    }
}

/// Client for an OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_hint: &str) -> Result<String, TranscriptionError> {
        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("recording.{}", extension_for(mime_hint)))
            .mime_str(mime_hint)
            .map_err(|e| TranscriptionError::ServiceError(format!("bad mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", file);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        read_text(response).await
    }

    fn backend_label(&self) -> &'static str {
        "openai"
    }
}

fn extension_for(mime: &str) -> &'static str {
    if mime.contains("wav") {
        "wav"
    } else if mime.contains("webm") {
        "webm"
    } else if mime.contains("ogg") {
        "ogg"
    } else {
        "m4a"
    }
}

fn request_error(e: reqwest::Error) -> TranscriptionError {
    if e.is_builder() {
        TranscriptionError::ServiceError(e.to_string())
    } else {
        TranscriptionError::NetworkError(e.to_string())
    }
}

/// Maps a non-success HTTP status onto the transcription error taxonomy.
fn status_error(status: StatusCode) -> TranscriptionError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        TranscriptionError::RateLimited
    } else {
        TranscriptionError::ServiceError(format!("server returned status {}", status))
    }
}

async fn read_text(response: reqwest::Response) -> Result<String, TranscriptionError> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status));
    }

    let body: TextResponse = response
        .json()
        .await
        .map_err(|e| TranscriptionError::ServiceError(format!("unreadable response: {}", e)))?;

    Ok(body.text.unwrap_or_default().trim().to_string())
}
