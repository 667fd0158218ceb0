//! The storyline pipeline facade.
//!
//! Wires the external collaborators together and exposes one method per
//! client-driven operation. Everything in here is thin; the stage logic
//! lives in the stage modules.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use sreel_models::{
    CharacterChoice, CharacterConcept, SegmentId, StageOutcome, Storyline, StorylineId,
    TranscriptUnit, VideoJobId, VisualStyles,
};
use sreel_providers::{
    AudioFormat, ImageGenerator, SpeechToText, StructuredGenerator, VideoRenderer,
};
use sreel_storage::{MediaBucket, MediaStore};
use sreel_store::{StoreError, StorylineRepository, StorylineStore};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::video::PollOutcome;
use crate::{characters, images, scenes, transcript, video};

/// An original video upload accompanying a creation request.
pub struct OriginalVideo {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. "mp4"
    pub extension: String,
    pub content_type: String,
}

/// Everything needed to start a storyline.
pub struct CreateStorylineRequest {
    /// Display name; derived from the upload when absent
    pub name: Option<String>,
    pub user_id: String,
    pub audio: Vec<u8>,
    pub audio_format: AudioFormat,
    pub original_video: Option<OriginalVideo>,
    /// Public URL of an already-uploaded original, used when no bytes are sent
    pub original_video_url: Option<String>,
    /// Visual style tag, must name a registered style
    pub style: String,
}

/// Result of a successful creation.
#[derive(Debug)]
pub struct CreatedStoryline {
    pub storyline: Storyline,
    /// Full transcript text, consumed by the character stage
    pub transcript_text: String,
    pub transcript: Vec<TranscriptUnit>,
}

/// The pipeline: one instance serves every storyline.
#[derive(Clone)]
pub struct StorylinePipeline {
    config: PipelineConfig,
    styles: VisualStyles,
    repo: StorylineRepository,
    media: Arc<dyn MediaStore>,
    speech: Arc<dyn SpeechToText>,
    llm: Arc<dyn StructuredGenerator>,
    images: Arc<dyn ImageGenerator>,
    renderer: Arc<dyn VideoRenderer>,
}

impl StorylinePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn StorylineStore>,
        media: Arc<dyn MediaStore>,
        speech: Arc<dyn SpeechToText>,
        llm: Arc<dyn StructuredGenerator>,
        images: Arc<dyn ImageGenerator>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            config,
            styles: VisualStyles::builtin(),
            repo: StorylineRepository::new(store),
            media,
            speech,
            llm,
            images,
            renderer,
        }
    }

    pub fn repository(&self) -> &StorylineRepository {
        &self.repo
    }

    pub fn styles(&self) -> &VisualStyles {
        &self.styles
    }

    /// Transcribe, derive scene prompts, and persist the new storyline.
    ///
    /// The storyline record appears atomically with its full pending
    /// segment list; no caller ever observes it half-built.
    pub async fn create_storyline(
        &self,
        request: CreateStorylineRequest,
    ) -> PipelineResult<StageOutcome<CreatedStoryline>> {
        if self.styles.get(&request.style).is_none() {
            return Err(PipelineError::validation(format!(
                "Invalid style provided: {}",
                request.style
            )));
        }

        let units = transcript::transcribe_audio(
            self.speech.as_ref(),
            request.audio,
            request.audio_format,
            self.config.max_audio_bytes,
        )
        .await?;
        let transcript_text = transcript::full_text(&units);

        let prompts = scenes::generate_scene_prompts(
            self.llm.as_ref(),
            &units,
            self.config.max_scene_prompts,
        )
        .await?;
        let segments = scenes::build_segments(&prompts, &request.style);

        let name = request.name.unwrap_or_else(|| "Untitled Storyline".to_string());
        let mut storyline = Storyline::new(name, request.user_id, segments, None);
        storyline.original_video_url = request.original_video_url;

        if let Some(original) = request.original_video {
            let key = format!("{}/original.{}", storyline.id, original.extension);
            match self
                .media
                .put_object(
                    MediaBucket::Originals,
                    &key,
                    original.bytes,
                    &original.content_type,
                )
                .await
            {
                Ok(url) => storyline.original_video_url = Some(url),
                // The storyline is still usable without its source copy.
                Err(e) => warn!(
                    storyline_id = %storyline.id,
                    "Could not store original video: {}",
                    e
                ),
            }
        }

        self.repo.create(&storyline).await?;
        info!(
            storyline_id = %storyline.id,
            segments = storyline.segments.len(),
            "Storyline created"
        );

        Ok(StageOutcome::ok(
            "Transcript and prompts generated successfully.",
            CreatedStoryline {
                storyline,
                transcript_text,
                transcript: units,
            },
        ))
    }

    /// Generate the four character concepts for a storyline attempt.
    pub async fn generate_characters(
        &self,
        storyline_id: &StorylineId,
        transcript_text: &str,
        style: &str,
    ) -> PipelineResult<StageOutcome<Vec<CharacterConcept>>> {
        let style = self
            .styles
            .get(style)
            .ok_or_else(|| PipelineError::validation(format!("Invalid style provided: {style}")))?;
        characters::generate_character_concepts(
            self.llm.as_ref(),
            self.images.as_ref(),
            self.media.as_ref(),
            storyline_id,
            transcript_text,
            style,
        )
        .await
    }

    /// Render images for pending segments and persist them in one write.
    ///
    /// `segment_ids` narrows the work to specific segments; `None` covers
    /// every pending one.
    pub async fn generate_images(
        &self,
        storyline_id: &StorylineId,
        segment_ids: Option<&[SegmentId]>,
        character: Option<&CharacterChoice>,
    ) -> PipelineResult<StageOutcome<Storyline>> {
        let storyline = self.repo.get(storyline_id).await?;
        images::generate_segment_images(
            self.images.as_ref(),
            self.media.as_ref(),
            &self.repo,
            &self.styles,
            &storyline,
            segment_ids,
            character,
        )
        .await
    }

    /// Submit the render job for one segment.
    pub async fn submit_segment_video(
        &self,
        storyline_id: &StorylineId,
        segment_id: &SegmentId,
    ) -> PipelineResult<StageOutcome<VideoJobId>> {
        video::submit_segment_video(self.renderer.as_ref(), &self.repo, storyline_id, segment_id)
            .await
    }

    /// Drive one render job to resolution.
    pub async fn poll_segment_video(
        &self,
        storyline_id: &StorylineId,
        segment_id: &SegmentId,
        job_id: &VideoJobId,
    ) -> PipelineResult<PollOutcome> {
        video::poll_video_job(
            self.renderer.as_ref(),
            self.media.as_ref(),
            &self.repo,
            &self.config,
            storyline_id,
            segment_id,
            job_id,
        )
        .await
    }

    /// Submit a segment's render job and poll it on a background task.
    pub async fn generate_segment_video(
        &self,
        storyline_id: &StorylineId,
        segment_id: &SegmentId,
    ) -> PipelineResult<(VideoJobId, JoinHandle<PipelineResult<PollOutcome>>)> {
        let outcome = self.submit_segment_video(storyline_id, segment_id).await?;
        let job_id = outcome
            .data
            .ok_or_else(|| PipelineError::empty_result("submission returned no job id"))?;

        let pipeline = self.clone();
        let (sid, seg, job) = (storyline_id.clone(), segment_id.clone(), job_id.clone());
        let handle =
            tokio::spawn(async move { pipeline.poll_segment_video(&sid, &seg, &job).await });
        Ok((job_id, handle))
    }

    /// Recover which storyline and segment own a render job id.
    pub async fn find_segment_by_job(
        &self,
        job_id: &VideoJobId,
    ) -> PipelineResult<Option<(StorylineId, SegmentId)>> {
        Ok(self.repo.find_by_video_job_id(job_id).await?)
    }

    /// Resume polling every job left in `video_processing` by a previous
    /// process. Returns the number of jobs picked up.
    pub async fn resume_outstanding_jobs(&self) -> PipelineResult<usize> {
        let jobs = self.repo.list_outstanding_jobs().await?;
        let count = jobs.len();

        for job in jobs {
            info!(
                storyline_id = %job.storyline_id,
                segment_id = %job.segment_id,
                job_id = %job.job_id,
                "Resuming render job poll"
            );
            let pipeline = self.clone();
            tokio::spawn(async move {
                if let Err(e) = pipeline
                    .poll_segment_video(&job.storyline_id, &job.segment_id, &job.job_id)
                    .await
                {
                    warn!(job_id = %job.job_id, "Resumed poll failed: {}", e);
                }
            });
        }

        Ok(count)
    }

    /// List a user's storylines, newest first.
    pub async fn list_storylines(&self, user_id: &str) -> PipelineResult<Vec<Storyline>> {
        Ok(self.repo.list_for_user(user_id).await?)
    }

    /// Delete a storyline and its stored media.
    ///
    /// Media removal is best effort; the record goes away regardless so the
    /// client never sees a half-deleted storyline resurface.
    pub async fn delete_storyline(&self, id: &StorylineId) -> PipelineResult<StageOutcome<()>> {
        match self.repo.get(id).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                return Ok(StageOutcome::err("Storyline not found."));
            }
            Err(e) => return Err(e.into()),
        }

        let prefix = format!("{id}/");
        for bucket in [
            MediaBucket::Images,
            MediaBucket::Videos,
            MediaBucket::Originals,
        ] {
            if let Err(e) = self.media.remove_prefix(bucket, &prefix).await {
                warn!(storyline_id = %id, "Could not remove {:?} media: {}", bucket, e);
            }
        }

        self.repo.delete(id).await?;
        info!(storyline_id = %id, "Storyline deleted");
        Ok(StageOutcome::ok("Storyline deleted successfully.", ()))
    }
}
