//! Image generation client.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Quality tier for a generation request. Portrait scenes use medium,
/// square character concepts use low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageQuality {
    Low,
    Medium,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Low => "low",
            ImageQuality::Medium => "medium",
        }
    }

    /// The size paired with each tier. Medium renders portrait frames,
    /// low renders square concept art.
    pub fn size(&self) -> &'static str {
        match self {
            ImageQuality::Low => "1024x1024",
            ImageQuality::Medium => "1024x1536",
        }
    }
}

/// A decoded generation result.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// The provider's rewrite of the prompt, when it reports one.
    pub revised_prompt: Option<String>,
}

/// Text-to-image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        quality: ImageQuality,
    ) -> ProviderResult<GeneratedImage>;
}

/// OpenAI-compatible images endpoint returning base64 payloads.
pub struct ImagesApiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}

impl ImagesApiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("IMAGE_API_KEY")
            .map_err(|_| ProviderError::config("IMAGE_API_KEY not set"))?;
        let base_url = std::env::var("IMAGE_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".to_string());
        Ok(Self::new(api_key, base_url, model))
    }
}

#[async_trait]
impl ImageGenerator for ImagesApiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        quality: ImageQuality,
    ) -> ProviderResult<GeneratedImage> {
        let url = format!("{}/images/generations", self.base_url);
        debug!(
            quality = quality.as_str(),
            size = quality.size(),
            "Requesting image generation"
        );

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": quality.size(),
            "quality": quality.as_str(),
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("images body: {e}")))?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response("images response held no data"))?;

        let b64 = datum
            .b64_json
            .ok_or_else(|| ProviderError::invalid_response("image datum had no b64_json"))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .map_err(|e| ProviderError::invalid_response(format!("b64_json decode: {e}")))?;

        Ok(GeneratedImage {
            bytes,
            revised_prompt: datum.revised_prompt,
        })
    }
}
