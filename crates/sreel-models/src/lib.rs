//! Shared data models for the StoryReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Storylines and their segment lists
//! - The segment status state machine
//! - Character concepts and visual styles
//! - Transcript units and timestamp formatting
//! - The uniform stage outcome shape returned by every pipeline stage

pub mod character;
pub mod ids;
pub mod outcome;
pub mod segment;
pub mod storyline;
pub mod style;
pub mod transcript;

// Re-export common types
pub use character::{CharacterChoice, CharacterConcept};
pub use ids::{SegmentId, StorylineId, VideoJobId};
pub use outcome::StageOutcome;
pub use segment::{Segment, SegmentStatus, TransitionError};
pub use storyline::{Storyline, StorylineStatus};
pub use style::{StyleGuide, VisualStyle, VisualStyles};
pub use transcript::{format_timestamp_range, TranscriptUnit};
