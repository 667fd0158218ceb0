//! Scene prompt generation.
//!
//! The transcript is handed to the LLM whole, and the model picks the key
//! visual moments itself, merging adjacent units where it sees fit. The
//! response is validated strictly: unknown fields or a malformed shape fail
//! the stage rather than being papered over.

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use tracing::{info, warn};

use sreel_models::{Segment, SegmentId, TranscriptUnit};
use sreel_providers::{StructuredGenerator, ToolSpec};

use crate::error::{PipelineError, PipelineResult};

const SCENES_SYSTEM_PROMPT: &str = "You are a visual prompt generator for AI image creation. Create simple, clear visual prompts based on video transcript segments.

RULES:
1. Keep prompts under 50 words each
2. Refer to characters as \"the main character\" - no physical descriptions
3. Focus on actions and scenes, not complex metaphors
4. Combine related adjacent segments when possible
5. Select up to 10 key visual moments only

Use the generate_image_prompts function with short, direct prompts.";

/// One scene suggested by the LLM.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScenePrompt {
    /// Timestamp of the source transcript unit(s), e.g. "00:08 - 00:14"
    pub timestamp: String,
    /// Text of the source transcript unit(s)
    pub text: String,
    /// Prompt for the image generator
    pub prompt: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct ScenePromptList {
    prompts: Vec<ScenePrompt>,
}

fn scene_tool() -> ToolSpec {
    let schema = schema_for!(ScenePromptList);
    ToolSpec {
        name: "generate_image_prompts".to_string(),
        description: "Generates a list of image prompts for key moments in a transcript."
            .to_string(),
        parameters: serde_json::to_value(schema).unwrap_or_default(),
    }
}

/// Ask the LLM for scene prompts covering the transcript's key moments.
///
/// The result is capped at `max_prompts`; anything past the cap is dropped
/// in order, never reshuffled.
pub async fn generate_scene_prompts(
    llm: &dyn StructuredGenerator,
    transcript: &[TranscriptUnit],
    max_prompts: usize,
) -> PipelineResult<Vec<ScenePrompt>> {
    if transcript.is_empty() {
        return Err(PipelineError::validation("transcript is empty"));
    }

    let full_transcript = transcript
        .iter()
        .map(|u| format!("[{}] {}", u.timestamp_range(), u.text))
        .collect::<Vec<_>>()
        .join("\n");

    let raw = llm
        .generate(
            SCENES_SYSTEM_PROMPT,
            &format!("Here is the full transcript:\n\n{full_transcript}"),
            &scene_tool(),
        )
        .await?;

    let list: ScenePromptList = serde_json::from_value(raw)
        .map_err(|e| PipelineError::validation(format!("scene prompts failed validation: {e}")))?;

    let mut prompts = list.prompts;
    prompts.retain(|p| !p.prompt.trim().is_empty());
    if prompts.is_empty() {
        return Err(PipelineError::empty_result(
            "model returned no usable scene prompts",
        ));
    }
    if prompts.len() > max_prompts {
        warn!(
            "Model returned {} scene prompts, truncating to {}",
            prompts.len(),
            max_prompts
        );
        prompts.truncate(max_prompts);
    }

    info!("Generated {} scene prompts", prompts.len());
    Ok(prompts)
}

/// Build the initial pending segment list from scene prompts. Ids and order
/// are positional and fixed for the life of the storyline.
pub fn build_segments(prompts: &[ScenePrompt], style: &str) -> Vec<Segment> {
    prompts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Segment::new(
                SegmentId::from_index(i),
                i as u32,
                p.text.clone(),
                p.timestamp.clone(),
                style,
                p.prompt.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLlm;
    use serde_json::json;

    fn transcript() -> Vec<TranscriptUnit> {
        vec![TranscriptUnit {
            text: "hello world".to_string(),
            start: 0.0,
            end: 5.0,
        }]
    }

    fn scene(n: usize) -> serde_json::Value {
        json!({
            "timestamp": "00:00 - 00:05",
            "text": format!("text {n}"),
            "prompt": format!("prompt {n}")
        })
    }

    #[tokio::test]
    async fn test_valid_prompts_become_segments() {
        let llm = FakeLlm::returning(json!({ "prompts": [scene(1), scene(2)] }));
        let prompts = generate_scene_prompts(&llm, &transcript(), 20)
            .await
            .unwrap();
        assert_eq!(prompts.len(), 2);

        let segments = build_segments(&prompts, "pixar");
        assert_eq!(segments[0].id.as_str(), "1");
        assert_eq!(segments[1].id.as_str(), "2");
        assert_eq!(segments[1].order, 1);
        assert!(segments.iter().all(|s| s.style == "pixar"));
    }

    #[tokio::test]
    async fn test_prompt_count_is_capped() {
        let many: Vec<_> = (0..30).map(scene).collect();
        let llm = FakeLlm::returning(json!({ "prompts": many }));
        let prompts = generate_scene_prompts(&llm, &transcript(), 20)
            .await
            .unwrap();
        assert_eq!(prompts.len(), 20);
        assert_eq!(prompts[0].text, "text 0");
        assert_eq!(prompts[19].text, "text 19");
    }

    #[tokio::test]
    async fn test_unknown_fields_rejected() {
        let llm = FakeLlm::returning(json!({
            "prompts": [{
                "timestamp": "00:00 - 00:05",
                "text": "t",
                "prompt": "p",
                "mood": "wistful"
            }]
        }));
        let err = generate_scene_prompts(&llm, &transcript(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_prompt_list_fails() {
        let llm = FakeLlm::returning(json!({ "prompts": [] }));
        let err = generate_scene_prompts(&llm, &transcript(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn test_empty_transcript_fails() {
        let llm = FakeLlm::returning(json!({ "prompts": [scene(1)] }));
        let err = generate_scene_prompts(&llm, &[], 20).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
