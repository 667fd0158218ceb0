//! Video submission and polling.
//!
//! Submission is fire-and-forget against the render service: the job id is
//! persisted on the segment before anything waits. Polling is a bounded
//! loop with exponential backoff; a job that never resolves within the
//! lifetime cap is marked failed rather than polled forever.

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use sreel_models::{SegmentId, SegmentStatus, StageOutcome, StorylineId, VideoJobId};
use sreel_providers::{VideoJobState, VideoRenderer};
use sreel_storage::{MediaBucket, MediaStore};
use sreel_store::{StoreError, StorylineRepository};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Video persisted, segment completed
    Completed { video_url: String },
    /// Segment marked failed with this reason
    Failed { reason: String },
    /// The storyline disappeared mid-poll; nothing left to update
    Abandoned,
}

/// Submit a render job for a segment whose image is ready.
///
/// Submitting a segment that already carries a job is a no-op returning the
/// existing id, so a duplicate client request cannot double-render.
pub async fn submit_segment_video(
    renderer: &dyn VideoRenderer,
    repo: &StorylineRepository,
    storyline_id: &StorylineId,
    segment_id: &SegmentId,
) -> PipelineResult<StageOutcome<VideoJobId>> {
    let storyline = repo.get(storyline_id).await?;
    let segment = storyline.segment(segment_id).ok_or_else(|| {
        PipelineError::validation(format!("segment {segment_id} not found"))
    })?;

    if let Some(existing) = &segment.video_job_id {
        match segment.status {
            SegmentStatus::VideoProcessing => {
                info!(
                    storyline_id = %storyline_id,
                    segment_id = %segment_id,
                    job_id = %existing,
                    "Render job already submitted, returning existing id"
                );
                return Ok(StageOutcome::ok(
                    "Video generation already in progress.",
                    existing.clone(),
                ));
            }
            SegmentStatus::Completed => {
                info!(
                    storyline_id = %storyline_id,
                    segment_id = %segment_id,
                    job_id = %existing,
                    "Segment video already rendered, returning existing id"
                );
                return Ok(StageOutcome::ok("Video already generated.", existing.clone()));
            }
            _ => {}
        }
    }

    if segment.status != SegmentStatus::ImageGenerated {
        return Err(PipelineError::validation(format!(
            "segment {segment_id} is {}, expected image_generated",
            segment.status.as_str()
        )));
    }
    if !segment.has_public_image() {
        return Err(PipelineError::validation(
            "Image must be a public URL to be processed by the render service.",
        ));
    }
    if segment.prompt.trim().is_empty() {
        return Err(PipelineError::validation(format!(
            "segment {segment_id} has no prompt"
        )));
    }

    let image_url = segment.image_url.clone().unwrap_or_default();
    let job_id = match renderer.submit_job(&image_url, &segment.prompt).await {
        Ok(id) => id,
        Err(e) => {
            // Park the segment in failed so the client stops retrying
            // blindly; losing this write only costs us that hint.
            if let Err(write_err) = repo
                .fail_segment(storyline_id, segment_id, &e.to_string())
                .await
            {
                warn!(
                    storyline_id = %storyline_id,
                    segment_id = %segment_id,
                    "Could not record submission failure: {}",
                    write_err
                );
            }
            return Err(e.into());
        }
    };

    repo.record_job(storyline_id, segment_id, &job_id).await?;
    info!(
        storyline_id = %storyline_id,
        segment_id = %segment_id,
        job_id = %job_id,
        "Render job submitted"
    );

    Ok(StageOutcome::ok(
        "Successfully submitted video generation task.",
        job_id,
    ))
}

/// Poll a render job until it resolves, the lifetime cap expires, or the
/// storyline disappears.
///
/// Transient provider errors and SUCCEEDED reports without an output URL
/// both re-poll; only a definitive failure or the cap mark the segment
/// failed.
pub async fn poll_video_job(
    renderer: &dyn VideoRenderer,
    media: &dyn MediaStore,
    repo: &StorylineRepository,
    config: &PipelineConfig,
    storyline_id: &StorylineId,
    segment_id: &SegmentId,
    job_id: &VideoJobId,
) -> PipelineResult<PollOutcome> {
    let started = Instant::now();
    let mut interval = config.poll_initial_interval;

    loop {
        sleep(interval).await;
        interval = (interval * 2).min(config.poll_max_interval);

        if started.elapsed() >= config.poll_max_lifetime {
            let reason = format!(
                "render job {job_id} did not finish within {}s",
                config.poll_max_lifetime.as_secs()
            );
            return fail(repo, storyline_id, segment_id, reason).await;
        }

        let status = match renderer.job_status(job_id).await {
            Ok(status) => status,
            Err(e) if e.is_transient() => {
                warn!(job_id = %job_id, "Transient poll error, retrying: {}", e);
                continue;
            }
            Err(e) => {
                return fail(repo, storyline_id, segment_id, e.to_string()).await;
            }
        };

        match status.state {
            VideoJobState::Pending | VideoJobState::Running => continue,
            VideoJobState::Succeeded => {
                let Some(remote_url) = status.output_url else {
                    // Artifact not published yet; the next poll will see it.
                    continue;
                };
                let key = format!("{storyline_id}/{segment_id}.mp4");
                let video_url = match media
                    .mirror_remote(MediaBucket::Videos, &key, &remote_url, "video/mp4")
                    .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        return fail(
                            repo,
                            storyline_id,
                            segment_id,
                            format!("could not persist rendered video: {e}"),
                        )
                        .await;
                    }
                };

                return match repo
                    .complete_segment(storyline_id, segment_id, &video_url)
                    .await
                {
                    Ok(_) => {
                        info!(
                            storyline_id = %storyline_id,
                            segment_id = %segment_id,
                            "Segment video completed"
                        );
                        Ok(PollOutcome::Completed { video_url })
                    }
                    Err(StoreError::NotFound(_)) => abandoned(storyline_id, job_id),
                    Err(e) => Err(e.into()),
                };
            }
            VideoJobState::Failed => {
                let reason = status
                    .failure_reason
                    .unwrap_or_else(|| "render job failed without a reason".to_string());
                return fail(repo, storyline_id, segment_id, reason).await;
            }
        }
    }
}

async fn fail(
    repo: &StorylineRepository,
    storyline_id: &StorylineId,
    segment_id: &SegmentId,
    reason: String,
) -> PipelineResult<PollOutcome> {
    match repo.fail_segment(storyline_id, segment_id, &reason).await {
        Ok(_) => {
            warn!(
                storyline_id = %storyline_id,
                segment_id = %segment_id,
                "Segment failed: {}",
                reason
            );
            Ok(PollOutcome::Failed { reason })
        }
        Err(StoreError::NotFound(_)) => {
            warn!(
                storyline_id = %storyline_id,
                "Storyline deleted while polling, dropping result"
            );
            Ok(PollOutcome::Abandoned)
        }
        Err(e) => Err(e.into()),
    }
}

fn abandoned(storyline_id: &StorylineId, job_id: &VideoJobId) -> PipelineResult<PollOutcome> {
    warn!(
        storyline_id = %storyline_id,
        job_id = %job_id,
        "Storyline deleted while polling, dropping result"
    );
    Ok(PollOutcome::Abandoned)
}
