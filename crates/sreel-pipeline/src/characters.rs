//! Character concept generation.
//!
//! Four candidates per attempt: the LLM writes four name/description pairs
//! from the transcript, then the portraits render concurrently. A portrait
//! failure drops that candidate without touching its siblings.

use futures::future::join_all;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use tracing::{error, info, warn};

use sreel_models::{CharacterChoice, CharacterConcept, StageOutcome, StorylineId, VisualStyle};
use sreel_providers::{ImageGenerator, ImageQuality, StructuredGenerator, ToolSpec};
use sreel_storage::{MediaBucket, MediaStore};

use crate::error::{PipelineError, PipelineResult};

const CHARACTER_COUNT: usize = 4;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct CharacterList {
    characters: Vec<CharacterEntry>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct CharacterEntry {
    name: String,
    description: String,
}

fn character_tool() -> ToolSpec {
    let schema = schema_for!(CharacterList);
    ToolSpec {
        name: "generate_character_descriptions".to_string(),
        description: "Generates 4 distinct character variations based on a transcript."
            .to_string(),
        parameters: serde_json::to_value(schema).unwrap_or_default(),
    }
}

fn character_system_prompt(style_name: &str) -> String {
    format!(
        "You are a character designer. Create 4 simple character variations based on the transcript.

RULES:
1. Keep descriptions under 25 words each
2. All 4 characters should be the same type (robot, human, animal, etc.)
3. Focus on personality differences, not complex details
4. Style: {style_name}

Use the generate_character_descriptions function with short, simple descriptions."
    )
}

/// Ask the LLM for exactly four character descriptions.
async fn describe_characters(
    llm: &dyn StructuredGenerator,
    transcript_text: &str,
    style: &VisualStyle,
) -> PipelineResult<Vec<CharacterChoice>> {
    let raw = llm
        .generate(
            &character_system_prompt(&style.name),
            &format!("Here is the full transcript:\n\n{transcript_text}"),
            &character_tool(),
        )
        .await?;

    let list: CharacterList = serde_json::from_value(raw).map_err(|e| {
        PipelineError::validation(format!("character descriptions failed validation: {e}"))
    })?;

    if list.characters.len() != CHARACTER_COUNT {
        return Err(PipelineError::validation(format!(
            "expected exactly {CHARACTER_COUNT} character descriptions, got {}",
            list.characters.len()
        )));
    }

    Ok(list
        .characters
        .into_iter()
        .map(|c| CharacterChoice {
            name: c.name,
            description: c.description,
        })
        .collect())
}

/// Generate the four character concepts for a storyline attempt.
///
/// The description step is all-or-nothing; the portrait fan-out tolerates
/// partial failure and reports how many of the four survived.
pub async fn generate_character_concepts(
    llm: &dyn StructuredGenerator,
    images: &dyn ImageGenerator,
    media: &dyn MediaStore,
    storyline_id: &StorylineId,
    transcript_text: &str,
    style: &VisualStyle,
) -> PipelineResult<StageOutcome<Vec<CharacterConcept>>> {
    if transcript_text.trim().is_empty() {
        return Err(PipelineError::validation("transcript is empty"));
    }

    let choices = describe_characters(llm, transcript_text, style).await?;
    info!("Generated {} character descriptions", choices.len());

    let portrait_clause = style.portrait_clause();
    let renders = choices.iter().enumerate().map(|(index, choice)| {
        let prompt = format!(
            "Generate a character portrait: {}. {}",
            choice.description, portrait_clause
        );
        let key = format!("{storyline_id}/characters/char-{}.png", index + 1);
        async move {
            let image = images.generate_image(&prompt, ImageQuality::Low).await?;
            let url = media
                .put_object(MediaBucket::Images, &key, image.bytes, "image/png")
                .await?;
            Ok::<_, PipelineError>(CharacterConcept {
                id: format!("char-{}", index + 1),
                name: choice.name.clone(),
                description: choice.description.clone(),
                image_url: url,
                revised_prompt: image.revised_prompt,
            })
        }
    });

    let mut concepts = Vec::new();
    for (index, result) in join_all(renders).await.into_iter().enumerate() {
        match result {
            Ok(concept) => concepts.push(concept),
            Err(e) => warn!(
                storyline_id = %storyline_id,
                "Portrait {} failed: {}",
                index + 1,
                e
            ),
        }
    }

    if concepts.is_empty() {
        error!(storyline_id = %storyline_id, "Every character portrait failed");
        return Ok(StageOutcome::err(
            "Character image generation failed for all prompts.",
        ));
    }

    Ok(StageOutcome::ok(
        format!(
            "Successfully generated {}/{CHARACTER_COUNT} character concepts.",
            concepts.len()
        ),
        concepts,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeImages, FakeLlm, FakeMedia};
    use serde_json::json;
    use sreel_models::VisualStyles;

    fn four_characters() -> serde_json::Value {
        json!({
            "characters": (1..=4).map(|i| json!({
                "name": format!("Robo {i}"),
                "description": format!("a curious robot number {i}")
            })).collect::<Vec<_>>()
        })
    }

    fn style() -> VisualStyle {
        VisualStyles::builtin().get("pixar").unwrap().clone()
    }

    #[tokio::test]
    async fn test_full_success() {
        let llm = FakeLlm::returning(four_characters());
        let images = FakeImages::succeeding();
        let media = FakeMedia::new();
        let id = StorylineId::new();

        let outcome =
            generate_character_concepts(&llm, &images, &media, &id, "a transcript", &style())
                .await
                .unwrap();

        assert!(outcome.success);
        let concepts = outcome.data.unwrap();
        assert_eq!(concepts.len(), 4);
        assert_eq!(concepts[0].id, "char-1");
        assert!(concepts[0].image_url.starts_with("https://"));
        assert_eq!(media.keys().len(), 4);
    }

    #[tokio::test]
    async fn test_partial_failure_reports_count() {
        let llm = FakeLlm::returning(four_characters());
        let images = FakeImages::failing_for(&["number 2", "number 4"]);
        let media = FakeMedia::new();
        let id = StorylineId::new();

        let outcome =
            generate_character_concepts(&llm, &images, &media, &id, "a transcript", &style())
                .await
                .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "Successfully generated 2/4 character concepts.");
        assert_eq!(outcome.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_total_portrait_failure_is_stage_failure() {
        let llm = FakeLlm::returning(four_characters());
        let images = FakeImages::failing();
        let media = FakeMedia::new();
        let id = StorylineId::new();

        let outcome =
            generate_character_concepts(&llm, &images, &media, &id, "a transcript", &style())
                .await
                .unwrap();

        assert!(!outcome.success);
        assert!(outcome.data.is_none());
    }

    #[tokio::test]
    async fn test_wrong_description_count_hard_fails() {
        let llm = FakeLlm::returning(json!({
            "characters": [
                { "name": "Solo", "description": "just one robot" }
            ]
        }));
        let images = FakeImages::succeeding();
        let media = FakeMedia::new();
        let id = StorylineId::new();

        let err = generate_character_concepts(&llm, &images, &media, &id, "a transcript", &style())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
