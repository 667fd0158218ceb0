//! High-level storyline mutations on top of the store.
//!
//! Every mutation is a read-modify-write cycle retried on version
//! conflicts, so concurrent stage completions interleave without losing
//! each other's writes.

use std::sync::Arc;

use tracing::{debug, warn};

use sreel_models::{
    SegmentId, SegmentStatus, Storyline, StorylineId, StorylineStatus, VideoJobId,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{OutstandingJob, StorylineStore};

/// Attempts before a contended update gives up.
const MAX_CAS_ATTEMPTS: u32 = 5;

/// One image-stage result to fold into a storyline.
#[derive(Debug, Clone)]
pub struct ImageUpdate {
    pub segment_id: SegmentId,
    pub image_url: String,
    pub revised_prompt: Option<String>,
}

/// Mutation layer over a [`StorylineStore`].
#[derive(Clone)]
pub struct StorylineRepository {
    store: Arc<dyn StorylineStore>,
}

impl StorylineRepository {
    pub fn new(store: Arc<dyn StorylineStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StorylineStore> {
        &self.store
    }

    pub async fn create(&self, storyline: &Storyline) -> StoreResult<()> {
        self.store.create(storyline).await
    }

    pub async fn get(&self, id: &StorylineId) -> StoreResult<Storyline> {
        self.store.get(id).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Storyline>> {
        self.store.list_for_user(user_id).await
    }

    pub async fn delete(&self, id: &StorylineId) -> StoreResult<()> {
        self.store.delete(id).await
    }

    pub async fn find_by_video_job_id(
        &self,
        job_id: &VideoJobId,
    ) -> StoreResult<Option<(StorylineId, SegmentId)>> {
        self.store.find_by_video_job_id(job_id).await
    }

    pub async fn list_outstanding_jobs(&self) -> StoreResult<Vec<OutstandingJob>> {
        self.store.list_outstanding_jobs().await
    }

    /// Read-modify-write with conflict retry. The closure runs against a
    /// fresh copy on every attempt, so it must be safe to re-apply.
    pub async fn mutate<F>(&self, id: &StorylineId, mut apply: F) -> StoreResult<Storyline>
    where
        F: FnMut(&mut Storyline) -> StoreResult<()> + Send,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut storyline = self.store.get(id).await?;
            apply(&mut storyline)?;

            match self.store.update(&storyline).await {
                Ok(version) => {
                    storyline.version = version;
                    return Ok(storyline);
                }
                Err(e) if e.is_conflict() => {
                    debug!(
                        storyline_id = %id,
                        attempt,
                        "Lost update race, re-reading"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(storyline_id = %id, "Update starved after {MAX_CAS_ATTEMPTS} attempts");
        Err(StoreError::RetriesExhausted(id.clone()))
    }

    /// Fold a batch of image-stage successes into the storyline in a single
    /// write: each segment advances to `image_generated` and the image URL
    /// cache grows by the new URLs.
    pub async fn apply_images(
        &self,
        id: &StorylineId,
        updates: &[ImageUpdate],
    ) -> StoreResult<Storyline> {
        self.mutate(id, |storyline| {
            for update in updates {
                let segment = storyline
                    .segment_mut(&update.segment_id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                segment.apply_image(&update.image_url)?;
                if let Some(revised) = &update.revised_prompt {
                    segment
                        .metadata
                        .insert("revised_prompt".to_string(), revised.clone().into());
                }
                if !storyline.generated_image_urls.contains(&update.image_url) {
                    storyline.generated_image_urls.push(update.image_url.clone());
                }
            }
            Ok(())
        })
        .await
    }

    /// Record a submitted render job against its segment.
    pub async fn record_job(
        &self,
        id: &StorylineId,
        segment_id: &SegmentId,
        job_id: &VideoJobId,
    ) -> StoreResult<Storyline> {
        self.mutate(id, |storyline| {
            let segment = storyline
                .segment_mut(segment_id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            segment.apply_job(job_id.clone())?;
            Ok(())
        })
        .await
    }

    /// Persist a finished video, complete the segment, and promote the
    /// storyline when it was the last one outstanding.
    pub async fn complete_segment(
        &self,
        id: &StorylineId,
        segment_id: &SegmentId,
        video_url: &str,
    ) -> StoreResult<Storyline> {
        self.mutate(id, |storyline| {
            let segment = storyline
                .segment_mut(segment_id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            segment.apply_video(video_url)?;
            if !storyline.generated_video_urls.contains(&video_url.to_string()) {
                storyline.generated_video_urls.push(video_url.to_string());
            }
            storyline.promote_if_complete();
            Ok(())
        })
        .await
    }

    /// Mark a segment failed with a reason, recorded in segment metadata.
    pub async fn fail_segment(
        &self,
        id: &StorylineId,
        segment_id: &SegmentId,
        reason: &str,
    ) -> StoreResult<Storyline> {
        self.mutate(id, |storyline| {
            let segment = storyline
                .segment_mut(segment_id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            segment.transition(SegmentStatus::Failed)?;
            segment
                .metadata
                .insert("failure_reason".to_string(), reason.into());
            Ok(())
        })
        .await
    }

    /// Mark the whole storyline failed (aborted generation attempt).
    pub async fn fail_storyline(&self, id: &StorylineId) -> StoreResult<Storyline> {
        self.mutate(id, |storyline| {
            storyline.status = StorylineStatus::Failed;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorylineStore;
    use sreel_models::Segment;

    fn repo_with(segments: usize) -> (StorylineRepository, Storyline) {
        let segs = (0..segments)
            .map(|i| {
                Segment::new(
                    SegmentId::from_index(i),
                    i as u32,
                    format!("text {i}"),
                    "00:00 - 00:05",
                    "pixar",
                    format!("prompt {i}"),
                )
            })
            .collect();
        let storyline = Storyline::new("demo", "user-1", segs, None);
        (
            StorylineRepository::new(Arc::new(MemoryStorylineStore::new())),
            storyline,
        )
    }

    #[tokio::test]
    async fn test_apply_images_is_one_write() {
        let (repo, storyline) = repo_with(2);
        repo.create(&storyline).await.unwrap();

        let updates = vec![
            ImageUpdate {
                segment_id: SegmentId::from_index(0),
                image_url: "https://cdn.example.com/1.png".to_string(),
                revised_prompt: Some("clearer".to_string()),
            },
            ImageUpdate {
                segment_id: SegmentId::from_index(1),
                image_url: "https://cdn.example.com/2.png".to_string(),
                revised_prompt: None,
            },
        ];
        let updated = repo.apply_images(&storyline.id, &updates).await.unwrap();

        assert_eq!(updated.version, 1);
        assert_eq!(updated.generated_image_urls.len(), 2);
        assert!(updated
            .segments
            .iter()
            .all(|s| s.status == SegmentStatus::ImageGenerated));
        assert_eq!(
            updated.segments[0].metadata["revised_prompt"],
            serde_json::json!("clearer")
        );
    }

    #[tokio::test]
    async fn test_complete_last_segment_promotes() {
        let (repo, storyline) = repo_with(1);
        repo.create(&storyline).await.unwrap();
        let sid = SegmentId::from_index(0);

        repo.apply_images(
            &storyline.id,
            &[ImageUpdate {
                segment_id: sid.clone(),
                image_url: "https://cdn.example.com/1.png".to_string(),
                revised_prompt: None,
            }],
        )
        .await
        .unwrap();
        repo.record_job(&storyline.id, &sid, &VideoJobId::from_string("job-1"))
            .await
            .unwrap();
        let done = repo
            .complete_segment(&storyline.id, &sid, "https://cdn.example.com/1.mp4")
            .await
            .unwrap();

        assert_eq!(done.status, StorylineStatus::Completed);
        assert_eq!(done.generated_video_urls, vec![
            "https://cdn.example.com/1.mp4".to_string()
        ]);
    }

    #[tokio::test]
    async fn test_fail_segment_records_reason() {
        let (repo, storyline) = repo_with(1);
        repo.create(&storyline).await.unwrap();
        let sid = SegmentId::from_index(0);

        repo.apply_images(
            &storyline.id,
            &[ImageUpdate {
                segment_id: sid.clone(),
                image_url: "https://cdn.example.com/1.png".to_string(),
                revised_prompt: None,
            }],
        )
        .await
        .unwrap();
        let failed = repo
            .fail_segment(&storyline.id, &sid, "render rejected the image")
            .await
            .unwrap();

        assert_eq!(failed.segments[0].status, SegmentStatus::Failed);
        assert_eq!(
            failed.segments[0].metadata["failure_reason"],
            serde_json::json!("render rejected the image")
        );
    }

    #[tokio::test]
    async fn test_illegal_transition_propagates() {
        let (repo, storyline) = repo_with(1);
        repo.create(&storyline).await.unwrap();
        let sid = SegmentId::from_index(0);

        // pending -> failed is not a legal move
        let err = repo
            .fail_segment(&storyline.id, &sid, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
    }
}
