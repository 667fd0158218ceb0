//! In-memory doubles for the external collaborators.
//!
//! These let the pipeline run end to end without network access. They live
//! in the library (not behind `cfg(test)`) so integration tests can share
//! them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use sreel_models::{Segment, SegmentId, Storyline, TranscriptUnit, VideoJobId};
use sreel_providers::{
    AudioFormat, GeneratedImage, ImageGenerator, ImageQuality, ProviderError, ProviderResult,
    SpeechToText, StructuredGenerator, ToolSpec, VideoJobState, VideoJobStatus, VideoRenderer,
};
use sreel_storage::{MediaBucket, MediaStore, StorageResult};

/// A storyline with `n` pending segments in the builtin pixar style.
pub fn storyline_with_segments(n: usize) -> Storyline {
    let segments = (0..n)
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
    Storyline::new("demo", "user-1", segments, None)
}

/// Speech-to-text double returning a canned transcript.
pub struct FakeSpeech {
    units: Vec<TranscriptUnit>,
}

impl FakeSpeech {
    pub fn returning(units: Vec<TranscriptUnit>) -> Self {
        Self { units }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _format: AudioFormat,
    ) -> ProviderResult<Vec<TranscriptUnit>> {
        Ok(self.units.clone())
    }
}

/// Structured-generation double replaying queued responses in order.
pub struct FakeLlm {
    responses: Mutex<VecDeque<serde_json::Value>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn returning(value: serde_json::Value) -> Self {
        let fake = Self::new();
        fake.push(value);
        fake
    }

    pub fn push(&self, value: serde_json::Value) {
        self.responses.lock().unwrap().push_back(value);
    }
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredGenerator for FakeLlm {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        tool: &ToolSpec,
    ) -> ProviderResult<serde_json::Value> {
        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            ProviderError::invalid_response(format!("no queued response for tool {}", tool.name))
        })
    }
}

enum ImageMode {
    Succeed,
    Fail,
    FailMatching(Vec<String>),
}

/// Image-generation double. Failure can be total or keyed on prompt
/// substrings so individual fan-out branches can be tripped.
pub struct FakeImages {
    mode: ImageMode,
}

impl FakeImages {
    pub fn succeeding() -> Self {
        Self {
            mode: ImageMode::Succeed,
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: ImageMode::Fail,
        }
    }

    pub fn failing_for(substrings: &[&str]) -> Self {
        Self {
            mode: ImageMode::FailMatching(substrings.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(
        &self,
        prompt: &str,
        _quality: ImageQuality,
    ) -> ProviderResult<GeneratedImage> {
        let fail = match &self.mode {
            ImageMode::Succeed => false,
            ImageMode::Fail => true,
            ImageMode::FailMatching(subs) => subs.iter().any(|s| prompt.contains(s.as_str())),
        };
        if fail {
            return Err(ProviderError::generation("scripted image failure"));
        }
        Ok(GeneratedImage {
            bytes: b"png".to_vec(),
            revised_prompt: None,
        })
    }
}

/// Media-store double recording every write in memory.
pub struct FakeMedia {
    objects: Mutex<Vec<(MediaBucket, String)>>,
    removed_prefixes: Mutex<Vec<(MediaBucket, String)>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            removed_prefixes: Mutex::new(Vec::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn removed_prefixes(&self) -> Vec<(MediaBucket, String)> {
        self.removed_prefixes.lock().unwrap().clone()
    }

    fn url(bucket: MediaBucket, key: &str) -> String {
        format!("https://cdn.test/{}/{}", bucket.default_name(), key)
    }
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn put_object(
        &self,
        bucket: MediaBucket,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.objects
            .lock()
            .unwrap()
            .push((bucket, key.to_string()));
        Ok(Self::url(bucket, key))
    }

    async fn mirror_remote(
        &self,
        bucket: MediaBucket,
        key: &str,
        _source_url: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.objects
            .lock()
            .unwrap()
            .push((bucket, key.to_string()));
        Ok(Self::url(bucket, key))
    }

    async fn remove_prefix(&self, bucket: MediaBucket, prefix: &str) -> StorageResult<u32> {
        self.removed_prefixes
            .lock()
            .unwrap()
            .push((bucket, prefix.to_string()));
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|(b, k)| *b != bucket || !k.starts_with(prefix));
        Ok((before - objects.len()) as u32)
    }
}

/// Render-service double: submissions hand out sequential job ids and
/// status polls replay a script, repeating the last entry forever.
pub struct FakeRenderer {
    reject_submissions: bool,
    submissions: AtomicUsize,
    polls: AtomicUsize,
    script: Mutex<Vec<VideoJobStatus>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            reject_submissions: false,
            submissions: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            script: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting_submissions() -> Self {
        Self {
            reject_submissions: true,
            ..Self::new()
        }
    }

    pub fn script_statuses(&self, statuses: Vec<VideoJobStatus>) {
        *self.script.lock().unwrap() = statuses;
        self.polls.store(0, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Default for FakeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoRenderer for FakeRenderer {
    async fn submit_job(&self, image_url: &str, _prompt: &str) -> ProviderResult<VideoJobId> {
        if self.reject_submissions {
            return Err(ProviderError::generation("scripted submission failure"));
        }
        if image_url.starts_with("data:") {
            return Err(ProviderError::generation("data URI rejected"));
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(VideoJobId::from_string(format!("job-{n}")))
    }

    async fn job_status(&self, _job_id: &VideoJobId) -> ProviderResult<VideoJobStatus> {
        let script = self.script.lock().unwrap();
        let index = self.polls.fetch_add(1, Ordering::SeqCst);
        let status = script
            .get(index)
            .or_else(|| script.last())
            .cloned()
            .unwrap_or(VideoJobStatus {
                state: VideoJobState::Running,
                output_url: None,
                failure_reason: None,
            });
        Ok(status)
    }
}
