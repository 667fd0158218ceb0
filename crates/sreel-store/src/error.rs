//! Store error types.

use thiserror::Error;

use sreel_models::{StorylineId, TransitionError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting storylines.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storyline not found: {0}")]
    NotFound(StorylineId),

    #[error("Version conflict writing storyline {id} (expected version {expected})")]
    VersionConflict { id: StorylineId, expected: u64 },

    #[error("Concurrent writers starved the update of storyline {0}")]
    RetriesExhausted(StorylineId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the whole read-modify-write cycle could succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
