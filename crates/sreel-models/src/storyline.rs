//! The storyline aggregate.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{SegmentId, StorylineId};
use crate::segment::{Segment, SegmentStatus};

/// Overall status of a storyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorylineStatus {
    /// At least one segment is not terminal-success
    #[default]
    Processing,
    /// Every segment reached `completed`
    Completed,
    /// The generation attempt was aborted
    Failed,
}

impl StorylineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorylineStatus::Processing => "processing",
            StorylineStatus::Completed => "completed",
            StorylineStatus::Failed => "failed",
        }
    }
}

/// The aggregate root: one end-to-end generation attempt.
///
/// Mutated exclusively through whole-record read-modify-write against the
/// segment list or the URL caches; the `version` field carries the
/// optimistic-concurrency token checked by the store on every update.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Storyline {
    pub id: StorylineId,

    /// Display name, usually derived from the uploaded file name
    pub name: String,

    /// Owning user
    pub user_id: String,

    /// URL of the original upload; null until the upload completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_video_url: Option<String>,

    /// Append-only cache of generated image URLs. Eventually consistent
    /// with the segment list, never the source of truth.
    #[serde(default)]
    pub generated_image_urls: Vec<String>,

    /// Append-only cache of generated video URLs
    #[serde(default)]
    pub generated_video_urls: Vec<String>,

    #[serde(default)]
    pub status: StorylineStatus,

    /// Ordered segment list; order is fixed at scene-prompt time
    pub segments: Vec<Segment>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency version, incremented by the store on write
    #[serde(default)]
    pub version: u64,
}

impl Storyline {
    /// Create a new storyline with its initial segment list, atomically
    /// `Processing`. A storyline is never exposed partially constructed.
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        segments: Vec<Segment>,
        original_video_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: StorylineId::new(),
            name: name.into(),
            user_id: user_id.into(),
            original_video_url,
            generated_image_urls: Vec::new(),
            generated_video_urls: Vec::new(),
            status: StorylineStatus::Processing,
            segments,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Find a segment by id.
    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    /// Find a segment by id, mutably.
    pub fn segment_mut(&mut self, id: &SegmentId) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| &s.id == id)
    }

    /// True iff every segment reached terminal success.
    pub fn all_segments_completed(&self) -> bool {
        !self.segments.is_empty()
            && self
                .segments
                .iter()
                .all(|s| s.status == SegmentStatus::Completed)
    }

    /// Promote the overall status to `Completed` if every segment is done.
    /// Returns true if the promotion happened.
    pub fn promote_if_complete(&mut self) -> bool {
        if self.status == StorylineStatus::Processing && self.all_segments_completed() {
            self.status = StorylineStatus::Completed;
            true
        } else {
            false
        }
    }
}
