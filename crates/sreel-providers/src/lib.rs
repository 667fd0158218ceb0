//! Narrow clients for the four external AI collaborators.
//!
//! Each provider is consumed through one trait so the pipeline can be
//! exercised against test doubles:
//! - [`SpeechToText`]: hosted transcription (Whisper-compatible)
//! - [`StructuredGenerator`]: tool-calling text generation
//! - [`ImageGenerator`]: image generation
//! - [`VideoRenderer`]: asynchronous image-to-video rendering
//!
//! The REST implementations speak the OpenAI-compatible wire shapes for
//! speech/LLM/image and a task-based shape for video rendering.

pub mod error;
pub mod image;
pub mod llm;
pub mod speech;
pub mod video;

pub use error::{ProviderError, ProviderResult};
pub use image::{GeneratedImage, ImageGenerator, ImageQuality, ImagesApiClient};
pub use llm::{ChatToolClient, StructuredGenerator, ToolSpec};
pub use speech::{AudioFormat, SpeechToText, WhisperClient};
pub use video::{RenderApiClient, VideoJobState, VideoJobStatus, VideoRenderer};
