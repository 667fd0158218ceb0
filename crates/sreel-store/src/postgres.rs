//! Postgres-backed store. Segments live in a JSONB column so the whole
//! aggregate is read and written as one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use sreel_models::{
    Segment, SegmentId, Storyline, StorylineId, StorylineStatus, VideoJobId,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{OutstandingJob, StorylineStore};

/// Column list for storyline queries.
const STORYLINE_COLUMNS: &str = "id, name, user_id, original_video_url, \
    generated_image_urls, generated_video_urls, status, segments, \
    created_at, updated_at, version";

/// Postgres [`StorylineStore`].
#[derive(Clone)]
pub struct PgStorylineStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct StorylineRow {
    id: String,
    name: String,
    user_id: String,
    original_video_url: Option<String>,
    generated_image_urls: serde_json::Value,
    generated_video_urls: serde_json::Value,
    status: String,
    segments: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl StorylineRow {
    fn into_storyline(self) -> StoreResult<Storyline> {
        let status = match self.status.as_str() {
            "completed" => StorylineStatus::Completed,
            "failed" => StorylineStatus::Failed,
            _ => StorylineStatus::Processing,
        };
        let segments: Vec<Segment> = serde_json::from_value(self.segments)?;
        Ok(Storyline {
            id: StorylineId::from_string(self.id),
            name: self.name,
            user_id: self.user_id,
            original_video_url: self.original_video_url,
            generated_image_urls: serde_json::from_value(self.generated_image_urls)?,
            generated_video_urls: serde_json::from_value(self.generated_video_urls)?,
            status,
            segments,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version as u64,
        })
    }
}

impl PgStorylineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using `DATABASE_URL`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StorylineStore for PgStorylineStore {
    async fn create(&self, storyline: &Storyline) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO storylines
                (id, name, user_id, original_video_url, generated_image_urls,
                 generated_video_urls, status, segments, created_at, updated_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(storyline.id.as_str())
        .bind(&storyline.name)
        .bind(&storyline.user_id)
        .bind(&storyline.original_video_url)
        .bind(serde_json::to_value(&storyline.generated_image_urls)?)
        .bind(serde_json::to_value(&storyline.generated_video_urls)?)
        .bind(storyline.status.as_str())
        .bind(serde_json::to_value(&storyline.segments)?)
        .bind(storyline.created_at)
        .bind(storyline.updated_at)
        .bind(storyline.version as i64)
        .execute(&self.pool)
        .await?;

        debug!(storyline_id = %storyline.id, "Created storyline");
        Ok(())
    }

    async fn get(&self, id: &StorylineId) -> StoreResult<Storyline> {
        let query = format!("SELECT {STORYLINE_COLUMNS} FROM storylines WHERE id = $1");
        let row = sqlx::query_as::<_, StorylineRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.into_storyline()
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Storyline>> {
        let query = format!(
            "SELECT {STORYLINE_COLUMNS} FROM storylines
             WHERE user_id = $1
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, StorylineRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(StorylineRow::into_storyline).collect()
    }

    async fn update(&self, storyline: &Storyline) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE storylines SET
                name = $2,
                original_video_url = $3,
                generated_image_urls = $4,
                generated_video_urls = $5,
                status = $6,
                segments = $7,
                updated_at = NOW(),
                version = version + 1
             WHERE id = $1 AND version = $8",
        )
        .bind(storyline.id.as_str())
        .bind(&storyline.name)
        .bind(&storyline.original_video_url)
        .bind(serde_json::to_value(&storyline.generated_image_urls)?)
        .bind(serde_json::to_value(&storyline.generated_video_urls)?)
        .bind(storyline.status.as_str())
        .bind(serde_json::to_value(&storyline.segments)?)
        .bind(storyline.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a lost race from a deleted record.
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM storylines WHERE id = $1")
                    .bind(storyline.id.as_str())
                    .fetch_optional(&self.pool)
                    .await?;
            return match exists {
                Some(_) => Err(StoreError::VersionConflict {
                    id: storyline.id.clone(),
                    expected: storyline.version,
                }),
                None => Err(StoreError::NotFound(storyline.id.clone())),
            };
        }

        Ok(storyline.version + 1)
    }

    async fn delete(&self, id: &StorylineId) -> StoreResult<()> {
        sqlx::query("DELETE FROM storylines WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_video_job_id(
        &self,
        job_id: &VideoJobId,
    ) -> StoreResult<Option<(StorylineId, SegmentId)>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT s.id, seg->>'id'
             FROM storylines s, jsonb_array_elements(s.segments) seg
             WHERE seg->>'video_job_id' = $1
             LIMIT 1",
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(storyline_id, segment_id)| {
            (
                StorylineId::from_string(storyline_id),
                SegmentId::from_string(segment_id),
            )
        }))
    }

    async fn list_outstanding_jobs(&self) -> StoreResult<Vec<OutstandingJob>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT s.id, seg->>'id', seg->>'video_job_id'
             FROM storylines s, jsonb_array_elements(s.segments) seg
             WHERE seg->>'status' = 'video_processing'
               AND seg->>'video_job_id' IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(storyline_id, segment_id, job_id)| OutstandingJob {
                storyline_id: StorylineId::from_string(storyline_id),
                segment_id: SegmentId::from_string(segment_id),
                job_id: VideoJobId::from_string(job_id),
            })
            .collect())
    }
}
