//! The persistence seam for storyline aggregates.

use async_trait::async_trait;

use sreel_models::{SegmentId, Storyline, StorylineId, VideoJobId};

use crate::error::StoreResult;

/// An outstanding render job discovered in persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingJob {
    pub storyline_id: StorylineId,
    pub segment_id: SegmentId,
    pub job_id: VideoJobId,
}

/// Whole-record storyline persistence.
///
/// Updates are compare-and-swap: the write succeeds only when the stored
/// version still equals `storyline.version`, and the store bumps the version
/// on success. Callers that lose the race re-read and re-apply.
#[async_trait]
pub trait StorylineStore: Send + Sync {
    /// Persist a brand new storyline. Fails if the id already exists.
    async fn create(&self, storyline: &Storyline) -> StoreResult<()>;

    /// Load a storyline by id.
    async fn get(&self, id: &StorylineId) -> StoreResult<Storyline>;

    /// List every storyline owned by a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Storyline>>;

    /// Write the whole record if the stored version matches
    /// `storyline.version`. Returns the new version on success.
    async fn update(&self, storyline: &Storyline) -> StoreResult<u64>;

    /// Remove a storyline record. Removing an absent id is not an error.
    async fn delete(&self, id: &StorylineId) -> StoreResult<()>;

    /// Reverse lookup: which storyline and segment own a render job id.
    async fn find_by_video_job_id(
        &self,
        job_id: &VideoJobId,
    ) -> StoreResult<Option<(StorylineId, SegmentId)>>;

    /// Every segment still in `video_processing` with a recorded job id,
    /// across all storylines. Used to resume polling after a restart.
    async fn list_outstanding_jobs(&self) -> StoreResult<Vec<OutstandingJob>>;
}
