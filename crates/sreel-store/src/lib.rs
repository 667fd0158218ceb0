//! Storyline persistence.
//!
//! The aggregate is stored as one record and every update is
//! compare-and-swap on a version column, so concurrent stage completions
//! never overwrite each other. [`StorylineRepository`] layers retrying
//! read-modify-write mutations over the raw [`StorylineStore`] seam.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStorylineStore;
pub use postgres::PgStorylineStore;
pub use repository::{ImageUpdate, StorylineRepository};
pub use store::{OutstandingJob, StorylineStore};
