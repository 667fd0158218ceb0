//! Segments and the segment status state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{SegmentId, VideoJobId};

/// Status of a single segment as it moves through the pipeline.
///
/// The only legal transitions are:
/// - `Pending -> ImageGenerated` (image stage success)
/// - `ImageGenerated -> VideoProcessing` (video submission success)
/// - `VideoProcessing -> Completed` (poll success, media persisted)
/// - `ImageGenerated | VideoProcessing -> Failed` (submission or poll failure)
///
/// `Completed` and `Failed` are terminal. Recovery from `Failed` requires an
/// explicit new submission, never an automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Created with the storyline, no media yet
    #[default]
    Pending,
    /// Image generated and persisted
    ImageGenerated,
    /// Image-to-video job submitted, awaiting completion
    VideoProcessing,
    /// Video persisted
    Completed,
    /// Submission or rendering failed
    Failed,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::ImageGenerated => "image_generated",
            SegmentStatus::VideoProcessing => "video_processing",
            SegmentStatus::Completed => "completed",
            SegmentStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is defined from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Completed | SegmentStatus::Failed)
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: SegmentStatus) -> bool {
        use SegmentStatus::*;
        matches!(
            (self, to),
            (Pending, ImageGenerated)
                | (ImageGenerated, VideoProcessing)
                | (VideoProcessing, Completed)
                | (ImageGenerated, Failed)
                | (VideoProcessing, Failed)
        )
    }
}

/// Error returned when an illegal status transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal segment transition {from:?} -> {to:?} for segment {segment_id}")]
pub struct TransitionError {
    pub segment_id: SegmentId,
    pub from: SegmentStatus,
    pub to: SegmentStatus,
}

/// One scene/shot unit within a storyline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Stable id assigned at scene-prompt time, never reused
    pub id: SegmentId,

    /// Position in the narrative, fixed once assigned
    pub order: u32,

    /// Source transcript text
    pub text: String,

    /// Source timestamp range, e.g. "00:08 - 00:14"
    pub timestamp: String,

    /// Visual style tag
    pub style: String,

    /// Scene prompt; mutable until image generation starts
    pub prompt: String,

    /// Public URL of the generated image; once set, only superseded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Public URL of the generated video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// External rendering job id, set when the job is submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_job_id: Option<VideoJobId>,

    /// Current status
    #[serde(default)]
    pub status: SegmentStatus,

    /// Free-form metadata (revised prompts, provider hints)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Segment {
    /// Create a pending segment from scene-prompt output.
    pub fn new(
        id: SegmentId,
        order: u32,
        text: impl Into<String>,
        timestamp: impl Into<String>,
        style: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id,
            order,
            text: text.into(),
            timestamp: timestamp.into(),
            style: style.into(),
            prompt: prompt.into(),
            image_url: None,
            video_url: None,
            video_job_id: None,
            status: SegmentStatus::Pending,
            metadata: serde_json::Map::new(),
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, to: SegmentStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                segment_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record a persisted image and advance to `ImageGenerated`.
    pub fn apply_image(&mut self, image_url: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(SegmentStatus::ImageGenerated)?;
        self.image_url = Some(image_url.into());
        Ok(())
    }

    /// Record a submitted rendering job and advance to `VideoProcessing`.
    pub fn apply_job(&mut self, job_id: VideoJobId) -> Result<(), TransitionError> {
        self.transition(SegmentStatus::VideoProcessing)?;
        self.video_job_id = Some(job_id);
        Ok(())
    }

    /// Record the persisted video and advance to `Completed`.
    pub fn apply_video(&mut self, video_url: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(SegmentStatus::Completed)?;
        self.video_url = Some(video_url.into());
        Ok(())
    }

    /// True when the image URL is publicly fetchable (not an inline data URI).
    ///
    /// The rendering provider downloads the pixel source itself, so a
    /// `data:` URL can never be submitted.
    pub fn has_public_image(&self) -> bool {
        self.image_url
            .as_deref()
            .map(|u| !u.starts_with("data:"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Segment {
        Segment::new(
            SegmentId::from_index(0),
            0,
            "hello world",
            "00:00 - 00:05",
            "pixar",
            "a robot waves hello",
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut seg = pending();
        seg.apply_image("https://cdn.example.com/s/1.png").unwrap();
        assert_eq!(seg.status, SegmentStatus::ImageGenerated);

        seg.apply_job(VideoJobId::from_string("job-1")).unwrap();
        assert_eq!(seg.status, SegmentStatus::VideoProcessing);
        assert!(seg.video_job_id.is_some());

        seg.apply_video("https://cdn.example.com/s/1.mp4").unwrap();
        assert_eq!(seg.status, SegmentStatus::Completed);
        assert!(seg.image_url.is_some() && seg.video_url.is_some());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut seg = pending();
        // pending cannot fail or complete directly
        assert!(seg.transition(SegmentStatus::Failed).is_err());
        assert!(seg.transition(SegmentStatus::Completed).is_err());
        assert!(seg.transition(SegmentStatus::VideoProcessing).is_err());

        seg.apply_image("https://cdn.example.com/s/1.png").unwrap();
        seg.transition(SegmentStatus::Failed).unwrap();
        // failed is terminal
        assert!(seg.transition(SegmentStatus::ImageGenerated).is_err());
        assert!(seg.transition(SegmentStatus::VideoProcessing).is_err());
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut seg = pending();
        seg.apply_image("https://cdn.example.com/s/1.png").unwrap();
        seg.apply_job(VideoJobId::from_string("job-1")).unwrap();
        seg.apply_video("https://cdn.example.com/s/1.mp4").unwrap();
        assert!(seg.status.is_terminal());
        assert!(seg.transition(SegmentStatus::Failed).is_err());
    }

    #[test]
    fn test_data_uri_is_not_public() {
        let mut seg = pending();
        seg.image_url = Some("data:image/png;base64,AAAA".to_string());
        assert!(!seg.has_public_image());
        seg.image_url = Some("https://cdn.example.com/s/1.png".to_string());
        assert!(seg.has_public_image());
    }
}
