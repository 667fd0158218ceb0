//! Asynchronous image-to-video rendering client.
//!
//! Submission returns a job id immediately. Completion is observed by
//! polling [`VideoRenderer::job_status`] until a terminal state is reached.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use sreel_models::VideoJobId;

use crate::error::{ProviderError, ProviderResult};

const VIDEO_DURATION_SECONDS: u32 = 5;
const VIDEO_RATIO: &str = "720:1280";

/// Lifecycle state reported by the render service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoJobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl VideoJobState {
    fn parse(raw: &str) -> Self {
        match raw {
            "SUCCEEDED" => VideoJobState::Succeeded,
            "FAILED" | "CANCELLED" => VideoJobState::Failed,
            "RUNNING" => VideoJobState::Running,
            _ => VideoJobState::Pending,
        }
    }
}

/// A single status observation.
#[derive(Debug, Clone)]
pub struct VideoJobStatus {
    pub state: VideoJobState,
    /// Present once a succeeded job has published its artifact. A succeeded
    /// job may briefly report no URL; callers should poll again.
    pub output_url: Option<String>,
    pub failure_reason: Option<String>,
}

/// Asynchronous image-to-video rendering.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Submit a render job for a publicly fetchable source image. Returns
    /// the provider's job id without waiting for the render.
    async fn submit_job(&self, image_url: &str, prompt: &str) -> ProviderResult<VideoJobId>;

    /// Fetch the current status of a previously submitted job.
    async fn job_status(&self, job_id: &VideoJobId) -> ProviderResult<VideoJobStatus>;
}

/// Task-based REST rendering client (RunwayML wire shape).
pub struct RenderApiClient {
    api_key: String,
    base_url: String,
    model: String,
    api_version: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    failure: Option<String>,
    #[serde(rename = "failureCode", default)]
    failure_code: Option<String>,
}

impl RenderApiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            api_version: "2024-11-06".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("VIDEO_API_KEY")
            .map_err(|_| ProviderError::config("VIDEO_API_KEY not set"))?;
        let base_url = std::env::var("VIDEO_BASE_URL")
            .unwrap_or_else(|_| "https://api.dev.runwayml.com/v1".to_string());
        let model = std::env::var("VIDEO_MODEL").unwrap_or_else(|_| "gen4_turbo".to_string());
        Ok(Self::new(api_key, base_url, model))
    }

    /// Succeeded tasks publish their artifact either as `output[0]` or under
    /// an object key, depending on the provider revision.
    fn extract_output_url(output: Option<&Value>) -> Option<String> {
        let output = output?;
        if let Some(first) = output.as_array().and_then(|a| a.first()) {
            return first.as_str().map(str::to_string);
        }
        for key in ["videoUrl", "video_url", "url"] {
            if let Some(url) = output.get(key).and_then(Value::as_str) {
                return Some(url.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl VideoRenderer for RenderApiClient {
    async fn submit_job(&self, image_url: &str, prompt: &str) -> ProviderResult<VideoJobId> {
        // The render service fetches the image itself, so inline payloads
        // are rejected up front rather than failing server-side.
        if image_url.starts_with("data:") {
            return Err(ProviderError::generation(
                "render service requires a public image URL, not an inline data URI",
            ));
        }

        let url = format!("{}/image_to_video", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "promptImage": image_url,
            "promptText": prompt,
            "duration": VIDEO_DURATION_SECONDS,
            "ratio": VIDEO_RATIO,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("submit body: {e}")))?;

        debug!(job_id = %parsed.id, "Render job accepted");
        Ok(VideoJobId::from_string(parsed.id))
    }

    async fn job_status(&self, job_id: &VideoJobId) -> ProviderResult<VideoJobStatus> {
        let url = format!("{}/tasks/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", &self.api_version)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: TaskResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("task body: {e}")))?;

        let state = VideoJobState::parse(&parsed.status);
        let output_url = Self::extract_output_url(parsed.output.as_ref());
        let failure_reason = match (parsed.failure, parsed.failure_code) {
            (Some(msg), Some(code)) => Some(format!("{msg} ({code})")),
            (Some(msg), None) => Some(msg),
            (None, Some(code)) => Some(code),
            (None, None) => None,
        };

        Ok(VideoJobStatus {
            state,
            output_url,
            failure_reason,
        })
    }
}
