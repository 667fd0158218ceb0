//! S3-compatible object storage for storyline media.
//!
//! This crate provides:
//! - Byte uploads that return public URLs
//! - Mirroring remote artifacts (rendered videos) into owned storage
//! - Prefix deletion for storyline teardown

pub mod client;
pub mod error;

pub use client::{MediaBucket, MediaStore, S3MediaStore, StorageConfig};
pub use error::{StorageError, StorageResult};
