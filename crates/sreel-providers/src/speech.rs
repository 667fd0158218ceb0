//! Speech-to-text provider client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use sreel_models::TranscriptUnit;

use crate::error::{ProviderError, ProviderResult};

/// Audio container format of the uploaded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
}

impl AudioFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio.mp3",
            AudioFormat::Wav => "audio.wav",
            AudioFormat::M4a => "audio.m4a",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
        }
    }
}

/// Hosted speech-to-text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio track into time-stamped units covering the whole
    /// track, non-overlapping, in ascending time order.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        format: AudioFormat,
    ) -> ProviderResult<Vec<TranscriptUnit>>;
}

/// Whisper-compatible transcription endpoint (OpenAI/Groq wire shape).
pub struct WhisperClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    segments: Vec<TranscriptionSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            client: Client::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("SPEECH_API_KEY")
            .map_err(|_| ProviderError::config("SPEECH_API_KEY not set"))?;
        let base_url = std::env::var("SPEECH_BASE_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        let model = std::env::var("SPEECH_MODEL")
            .unwrap_or_else(|_| "whisper-large-v3-turbo".to_string());
        Ok(Self::new(api_key, base_url, model))
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        format: AudioFormat,
    ) -> ProviderResult<Vec<TranscriptUnit>> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!("Sending {} bytes of audio for transcription", audio.len());

        let part = Part::bytes(audio)
            .file_name(format.file_name())
            .mime_str(format.mime_type())
            .map_err(|e| ProviderError::transcription(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let transcription: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("transcription body: {e}")))?;

        let units: Vec<TranscriptUnit> = transcription
            .segments
            .into_iter()
            .map(|s| TranscriptUnit {
                text: s.text.trim().to_string(),
                start: s.start,
                end: s.end,
            })
            .collect();

        info!("Received {} transcript segments", units.len());
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_transcribe_parses_verbose_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "segments": [
                    { "start": 0.0, "end": 4.2, "text": " hello " },
                    { "start": 4.2, "end": 9.0, "text": "world" }
                ]
            })))
            .mount(&server)
            .await;

        let client = WhisperClient::new("key", server.uri(), "whisper-large-v3-turbo");
        let units = client
            .transcribe(vec![0u8; 16], AudioFormat::Mp3)
            .await
            .unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "hello");
        assert!(units[0].end <= units[1].start + f64::EPSILON);
    }

    #[tokio::test]
    async fn test_transcribe_surfaces_provider_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("file too large"))
            .mount(&server)
            .await;

        let client = WhisperClient::new("key", server.uri(), "whisper-large-v3-turbo");
        let err = client
            .transcribe(vec![0u8; 16], AudioFormat::Mp3)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 400, .. }));
        assert!(!err.is_transient());
    }
}
