//! Storyline generation pipeline.
//!
//! Turns a spoken-word video into a sequence of AI-generated video
//! segments: transcription, scene prompt generation, character concepts,
//! concurrent image generation, and asynchronous image-to-video rendering
//! with client-driven polling.

pub mod characters;
pub mod config;
pub mod error;
pub mod images;
pub mod pipeline;
pub mod scenes;
pub mod testing;
pub mod transcript;
pub mod video;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    CreateStorylineRequest, CreatedStoryline, OriginalVideo, StorylinePipeline,
};
pub use scenes::ScenePrompt;
pub use video::PollOutcome;
