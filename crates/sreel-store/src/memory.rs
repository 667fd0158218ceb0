//! In-memory store, used by tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use sreel_models::{SegmentId, SegmentStatus, Storyline, StorylineId, VideoJobId};

use crate::error::{StoreError, StoreResult};
use crate::store::{OutstandingJob, StorylineStore};

/// HashMap-backed [`StorylineStore`] with the same compare-and-swap
/// semantics as the database-backed store.
#[derive(Default)]
pub struct MemoryStorylineStore {
    records: RwLock<HashMap<String, Storyline>>,
}

impl MemoryStorylineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorylineStore for MemoryStorylineStore {
    async fn create(&self, storyline: &Storyline) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records.insert(storyline.id.as_str().to_string(), storyline.clone());
        Ok(())
    }

    async fn get(&self, id: &StorylineId) -> StoreResult<Storyline> {
        let records = self.records.read().await;
        records
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Storyline>> {
        let records = self.records.read().await;
        let mut matching: Vec<Storyline> = records
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn update(&self, storyline: &Storyline) -> StoreResult<u64> {
        let mut records = self.records.write().await;
        let current = records
            .get(storyline.id.as_str())
            .ok_or_else(|| StoreError::NotFound(storyline.id.clone()))?;

        if current.version != storyline.version {
            return Err(StoreError::VersionConflict {
                id: storyline.id.clone(),
                expected: storyline.version,
            });
        }

        let mut next = storyline.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        let version = next.version;
        records.insert(storyline.id.as_str().to_string(), next);
        Ok(version)
    }

    async fn delete(&self, id: &StorylineId) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records.remove(id.as_str());
        Ok(())
    }

    async fn find_by_video_job_id(
        &self,
        job_id: &VideoJobId,
    ) -> StoreResult<Option<(StorylineId, SegmentId)>> {
        let records = self.records.read().await;
        for storyline in records.values() {
            for segment in &storyline.segments {
                if segment.video_job_id.as_ref() == Some(job_id) {
                    return Ok(Some((storyline.id.clone(), segment.id.clone())));
                }
            }
        }
        Ok(None)
    }

    async fn list_outstanding_jobs(&self) -> StoreResult<Vec<OutstandingJob>> {
        let records = self.records.read().await;
        let mut jobs = Vec::new();
        for storyline in records.values() {
            for segment in &storyline.segments {
                if segment.status == SegmentStatus::VideoProcessing {
                    if let Some(job_id) = &segment.video_job_id {
                        jobs.push(OutstandingJob {
                            storyline_id: storyline.id.clone(),
                            segment_id: segment.id.clone(),
                            job_id: job_id.clone(),
                        });
                    }
                }
            }
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sreel_models::Segment;

    fn storyline() -> Storyline {
        let segments = vec![Segment::new(
            SegmentId::from_index(0),
            0,
            "text",
            "00:00 - 00:05",
            "pixar",
            "prompt",
        )];
        Storyline::new("demo", "user-1", segments, None)
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store = MemoryStorylineStore::new();
        let s = storyline();
        store.create(&s).await.unwrap();

        let loaded = store.get(&s.id).await.unwrap();
        assert_eq!(loaded.version, 0);

        let new_version = store.update(&loaded).await.unwrap();
        assert_eq!(new_version, 1);
        assert_eq!(store.get(&s.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = MemoryStorylineStore::new();
        let s = storyline();
        store.create(&s).await.unwrap();

        let reader_a = store.get(&s.id).await.unwrap();
        let reader_b = store.get(&s.id).await.unwrap();

        store.update(&reader_a).await.unwrap();
        let err = store.update(&reader_b).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_by_video_job_id() {
        let store = MemoryStorylineStore::new();
        let mut s = storyline();
        s.segments[0].apply_image("https://cdn.example.com/1.png").unwrap();
        s.segments[0]
            .apply_job(VideoJobId::from_string("job-42"))
            .unwrap();
        store.create(&s).await.unwrap();

        let found = store
            .find_by_video_job_id(&VideoJobId::from_string("job-42"))
            .await
            .unwrap();
        assert_eq!(found, Some((s.id.clone(), s.segments[0].id.clone())));

        let missing = store
            .find_by_video_job_id(&VideoJobId::from_string("job-404"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_outstanding_jobs_only_video_processing() {
        let store = MemoryStorylineStore::new();
        let mut s = storyline();
        s.segments[0].apply_image("https://cdn.example.com/1.png").unwrap();
        s.segments[0]
            .apply_job(VideoJobId::from_string("job-7"))
            .unwrap();
        store.create(&s).await.unwrap();

        let jobs = store.list_outstanding_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id.as_str(), "job-7");

        let mut done = store.get(&s.id).await.unwrap();
        done.segments[0]
            .apply_video("https://cdn.example.com/1.mp4")
            .unwrap();
        store.update(&done).await.unwrap();
        assert!(store.list_outstanding_jobs().await.unwrap().is_empty());
    }
}
