//! Character concepts.
//!
//! Concepts are ephemeral: exactly four are generated per attempt and the
//! user's pick travels onward as a plain name/description pair embedded in
//! later image prompts. Nothing here is persisted as its own entity.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One generated character candidate, with its portrait.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CharacterConcept {
    /// Positional id within the attempt ("char-1" .. "char-4")
    pub id: String,
    pub name: String,
    /// One-sentence visual description, quoted verbatim into image prompts
    pub description: String,
    /// Public URL of the portrait image
    pub image_url: String,
    /// Prompt rewrite returned by the image provider, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// The user's selected character, as embedded into scene image prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterChoice {
    pub name: String,
    pub description: String,
}
