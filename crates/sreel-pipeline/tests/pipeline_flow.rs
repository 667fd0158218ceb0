//! End-to-end pipeline scenarios against in-memory collaborators.

use std::sync::Arc;

use serde_json::json;

use sreel_models::{
    CharacterChoice, SegmentStatus, StorylineStatus, TranscriptUnit,
};
use sreel_pipeline::testing::{FakeImages, FakeLlm, FakeMedia, FakeRenderer, FakeSpeech};
use sreel_pipeline::{
    CreateStorylineRequest, CreatedStoryline, PipelineConfig, PollOutcome, StorylinePipeline,
};
use sreel_providers::{AudioFormat, VideoJobState, VideoJobStatus};
use sreel_storage::MediaBucket;
use sreel_store::MemoryStorylineStore;

fn transcript_units() -> Vec<TranscriptUnit> {
    vec![
        TranscriptUnit {
            text: "the main character wakes up".to_string(),
            start: 0.0,
            end: 5.0,
        },
        TranscriptUnit {
            text: "and sets off on an adventure".to_string(),
            start: 5.0,
            end: 11.0,
        },
    ]
}

fn scenes_response(n: usize) -> serde_json::Value {
    json!({
        "prompts": (0..n).map(|i| json!({
            "timestamp": "00:00 - 00:05",
            "text": format!("text {i}"),
            "prompt": format!("prompt {i}")
        })).collect::<Vec<_>>()
    })
}

fn characters_response() -> serde_json::Value {
    json!({
        "characters": (1..=4).map(|i| json!({
            "name": format!("Robo {i}"),
            "description": format!("a curious robot number {i}")
        })).collect::<Vec<_>>()
    })
}

struct Harness {
    pipeline: StorylinePipeline,
    llm: Arc<FakeLlm>,
    media: Arc<FakeMedia>,
    renderer: Arc<FakeRenderer>,
}

fn harness() -> Harness {
    let llm = Arc::new(FakeLlm::new());
    let media = Arc::new(FakeMedia::new());
    let renderer = Arc::new(FakeRenderer::new());
    let pipeline = StorylinePipeline::new(
        PipelineConfig::default(),
        Arc::new(MemoryStorylineStore::new()),
        media.clone(),
        Arc::new(FakeSpeech::returning(transcript_units())),
        llm.clone(),
        Arc::new(FakeImages::succeeding()),
        renderer.clone(),
    );
    Harness {
        pipeline,
        llm,
        media,
        renderer,
    }
}

async fn create(harness: &Harness, scene_count: usize) -> CreatedStoryline {
    harness.llm.push(scenes_response(scene_count));
    harness
        .pipeline
        .create_storyline(CreateStorylineRequest {
            name: Some("adventure".to_string()),
            user_id: "user-1".to_string(),
            audio: vec![0u8; 2048],
            audio_format: AudioFormat::Mp3,
            original_video: None,
            original_video_url: None,
            style: "pixar".to_string(),
        })
        .await
        .unwrap()
        .data
        .unwrap()
}

fn succeeded(url: &str) -> VideoJobStatus {
    VideoJobStatus {
        state: VideoJobState::Succeeded,
        output_url: Some(url.to_string()),
        failure_reason: None,
    }
}

#[tokio::test(start_paused = true)]
async fn full_flow_reaches_completed() {
    let h = harness();
    let created = create(&h, 2).await;
    let id = created.storyline.id.clone();
    assert_eq!(created.storyline.status, StorylineStatus::Processing);
    assert!(created
        .storyline
        .segments
        .iter()
        .all(|s| s.status == SegmentStatus::Pending));

    // character concepts
    h.llm.push(characters_response());
    let concepts = h
        .pipeline
        .generate_characters(&id, &created.transcript_text, "pixar")
        .await
        .unwrap();
    assert!(concepts.success);
    let concepts = concepts.data.unwrap();
    assert_eq!(concepts.len(), 4);

    // scene images
    let choice = CharacterChoice {
        name: concepts[0].name.clone(),
        description: concepts[0].description.clone(),
    };
    let images = h.pipeline.generate_images(&id, None, Some(&choice)).await.unwrap();
    assert!(images.success);
    assert_eq!(images.message, "Successfully generated 2/2 images.");

    // videos, one segment at a time
    h.renderer
        .script_statuses(vec![succeeded("https://render.test/out.mp4")]);
    for segment_id in images.data.unwrap().segments.iter().map(|s| s.id.clone()) {
        let submitted = h.pipeline.submit_segment_video(&id, &segment_id).await.unwrap();
        let outcome = h
            .pipeline
            .poll_segment_video(&id, &segment_id, &submitted.data.unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Completed { .. }));
    }

    let done = h.pipeline.repository().get(&id).await.unwrap();
    assert_eq!(done.status, StorylineStatus::Completed);
    assert!(done
        .segments
        .iter()
        .all(|s| s.status == SegmentStatus::Completed));
    assert_eq!(done.generated_image_urls.len(), 2);
    assert_eq!(done.generated_video_urls.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_completions_lose_nothing() {
    let h = harness();
    let created = create(&h, 2).await;
    let id = created.storyline.id.clone();

    let images = h.pipeline.generate_images(&id, None, None).await.unwrap();
    let segment_ids: Vec<_> = images
        .data
        .unwrap()
        .segments
        .iter()
        .map(|s| s.id.clone())
        .collect();

    h.renderer
        .script_statuses(vec![succeeded("https://render.test/out.mp4")]);

    let mut handles = Vec::new();
    for segment_id in &segment_ids {
        let submitted = h.pipeline.submit_segment_video(&id, segment_id).await.unwrap();
        let (pipeline, id, segment_id) = (h.pipeline.clone(), id.clone(), segment_id.clone());
        let job_id = submitted.data.unwrap();
        handles.push(tokio::spawn(async move {
            pipeline.poll_segment_video(&id, &segment_id, &job_id).await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, PollOutcome::Completed { .. }));
    }

    // both polls raced on the same record; neither write was lost
    let done = h.pipeline.repository().get(&id).await.unwrap();
    assert_eq!(done.status, StorylineStatus::Completed);
    assert_eq!(done.generated_video_urls.len(), 2);
    assert!(done.segments.iter().all(|s| s.video_url.is_some()));
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_outstanding_jobs() {
    let h = harness();
    let created = create(&h, 1).await;
    let id = created.storyline.id.clone();
    let images = h.pipeline.generate_images(&id, None, None).await.unwrap();
    let segment_id = images.data.unwrap().segments[0].id.clone();

    let submitted = h.pipeline.submit_segment_video(&id, &segment_id).await.unwrap();
    let job_id = submitted.data.unwrap();

    // reverse lookup from persisted state
    let owner = h.pipeline.find_segment_by_job(&job_id).await.unwrap();
    assert_eq!(owner, Some((id.clone(), segment_id.clone())));

    // a "restarted" process picks the job up and drives it home
    h.renderer
        .script_statuses(vec![succeeded("https://render.test/out.mp4")]);
    let resumed = h.pipeline.resume_outstanding_jobs().await.unwrap();
    assert_eq!(resumed, 1);

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(120);
    loop {
        let stored = h.pipeline.repository().get(&id).await.unwrap();
        if stored.segments[0].status == SegmentStatus::Completed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "resumed job never completed"
        );
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn delete_removes_media_and_record() {
    let h = harness();
    let created = create(&h, 2).await;
    let id = created.storyline.id.clone();
    h.pipeline.generate_images(&id, None, None).await.unwrap();
    assert_eq!(h.media.keys().len(), 2);

    let outcome = h.pipeline.delete_storyline(&id).await.unwrap();
    assert!(outcome.success);

    assert!(h.media.keys().is_empty());
    let prefixes = h.media.removed_prefixes();
    for bucket in [
        MediaBucket::Images,
        MediaBucket::Videos,
        MediaBucket::Originals,
    ] {
        assert!(prefixes.contains(&(bucket, format!("{id}/"))));
    }
    assert!(h.pipeline.repository().get(&id).await.is_err());

    // second delete reports not-found instead of erroring
    let again = h.pipeline.delete_storyline(&id).await.unwrap();
    assert!(!again.success);
}

#[tokio::test]
async fn invalid_style_is_rejected_up_front() {
    let h = harness();
    h.llm.push(scenes_response(1));
    let err = h
        .pipeline
        .create_storyline(CreateStorylineRequest {
            name: None,
            user_id: "user-1".to_string(),
            audio: vec![0u8; 64],
            audio_format: AudioFormat::Mp3,
            original_video: None,
            original_video_url: None,
            style: "vaporwave".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, sreel_pipeline::PipelineError::Validation(_)));
}
