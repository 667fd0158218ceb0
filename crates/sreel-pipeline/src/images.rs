//! Scene image generation.
//!
//! All pending segments render concurrently. Each branch generates, then
//! uploads; the branch's failure is caught and logged so its siblings keep
//! going. Successes are folded into the storyline in a single write.

use futures::future::join_all;
use tracing::{info, warn};

use sreel_models::{
    CharacterChoice, Segment, SegmentId, SegmentStatus, StageOutcome, Storyline, VisualStyles,
};
use sreel_providers::{ImageGenerator, ImageQuality};
use sreel_storage::{MediaBucket, MediaStore};
use sreel_store::{ImageUpdate, StorylineRepository};

use crate::error::{PipelineError, PipelineResult};

/// Compose the full instruction sent to the image model for one segment.
fn compose_prompt(
    segment: &Segment,
    character: Option<&CharacterChoice>,
    styles: &VisualStyles,
) -> PipelineResult<String> {
    let style = styles.get(&segment.style).ok_or_else(|| {
        PipelineError::validation(format!(
            "unknown style \"{}\" on segment {}",
            segment.style, segment.id
        ))
    })?;

    let character_instruction = character
        .map(|c| {
            format!(
                " The main character in this image frame must follow this exact description: \"{}\".",
                c.description
            )
        })
        .unwrap_or_default();

    Ok(format!(
        "Generate an image of the following scene: \"{}\".{} {}",
        segment.prompt,
        character_instruction,
        style.image_clause()
    ))
}

/// Generate images for a storyline's pending segments.
///
/// `selection` narrows the work to specific segment ids; `None` takes every
/// pending segment. Returns the updated storyline alongside the
/// partial-success message.
pub async fn generate_segment_images(
    images: &dyn ImageGenerator,
    media: &dyn MediaStore,
    repo: &StorylineRepository,
    styles: &VisualStyles,
    storyline: &Storyline,
    selection: Option<&[SegmentId]>,
    character: Option<&CharacterChoice>,
) -> PipelineResult<StageOutcome<Storyline>> {
    let targets: Vec<&Segment> = storyline
        .segments
        .iter()
        .filter(|s| s.status == SegmentStatus::Pending && !s.prompt.trim().is_empty())
        .filter(|s| selection.map_or(true, |ids| ids.contains(&s.id)))
        .collect();

    if targets.is_empty() {
        return Ok(StageOutcome::err(
            "No valid prompts provided for image generation.",
        ));
    }

    info!(
        storyline_id = %storyline.id,
        "Generating {} images concurrently",
        targets.len()
    );

    let renders = targets.iter().map(|segment| {
        let key = format!("{}/{}.png", storyline.id, segment.id);
        let prompt = compose_prompt(segment, character, styles);
        async move {
            let prompt = prompt?;
            let image = images.generate_image(&prompt, ImageQuality::Medium).await?;
            let url = media
                .put_object(MediaBucket::Images, &key, image.bytes, "image/png")
                .await?;
            Ok::<_, PipelineError>(ImageUpdate {
                segment_id: segment.id.clone(),
                image_url: url,
                revised_prompt: image.revised_prompt,
            })
        }
    });

    let mut updates = Vec::new();
    for (segment, result) in targets.iter().zip(join_all(renders).await) {
        match result {
            Ok(update) => updates.push(update),
            Err(e) => warn!(
                storyline_id = %storyline.id,
                segment_id = %segment.id,
                "Image generation failed: {}",
                e
            ),
        }
    }

    if updates.is_empty() {
        return Ok(StageOutcome::err("Image generation failed for all prompts."));
    }

    let updated = repo.apply_images(&storyline.id, &updates).await?;

    Ok(StageOutcome::ok(
        format!(
            "Successfully generated {}/{} images.",
            updates.len(),
            targets.len()
        ),
        updated,
    ))
}
