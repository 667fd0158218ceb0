//! Visual style registry.
//!
//! A style guide is either a structured object, serialized verbatim into the
//! image instruction as JSON, or free text, interpolated into the sentence.
//! The three production styles ship built in; unknown tags are a validation
//! error at the stage boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// How a style's look is described to the image model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StyleGuide {
    /// Free-text description, interpolated into the instruction
    Text(String),
    /// Structured guide, serialized verbatim as pretty JSON
    Structured(serde_json::Value),
}

/// A named visual style.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VisualStyle {
    pub name: String,
    pub guide: StyleGuide,
}

/// Registry of visual styles, keyed by tag.
#[derive(Debug, Clone)]
pub struct VisualStyles {
    styles: HashMap<String, VisualStyle>,
}

impl VisualStyles {
    /// The built-in production styles.
    pub fn builtin() -> Self {
        let mut styles = HashMap::new();

        styles.insert(
            "pixar".to_string(),
            VisualStyle {
                name: "Pixar".to_string(),
                guide: StyleGuide::Structured(json!({
                    "style": {
                        "overallLook": "Cartoony Pixar-style digital dry brush painted illustration",
                        "colorPalette": "Bright, realistic colors with warm ambient lighting",
                        "renderQuality": "High-resolution 2D rendering with soft shadows and subtle highlights, a painted / drawn quality",
                        "aestheticInfluence": "Pixar animation with a clean, cheerful, and polished design with a hint of painted / drawn / textured quality to it",
                        "environmentDetail": "Office setting with soft wooden textures, smooth surfaces, and natural sunlight streaming through a window",
                        "composition": "Character-focused portrait in 9:16 vertical format, centered with balanced props and clean layout"
                    }
                })),
            },
        );

        styles.insert(
            "painted-animation".to_string(),
            VisualStyle {
                name: "Painted Animation".to_string(),
                guide: StyleGuide::Structured(json!({
                    "style": {
                        "render": "stylized 3-D animation",
                        "inspiration": "modern feature-film (Pixar/DreamWorks) look",
                        "camera_angle": "slightly low, upward view",
                        "depth_of_field": "moderate background blur for clear subject focus"
                    },
                    "lighting": {
                        "scheme": "cinematic three-point",
                        "key_light": { "origin": "upper-left front", "temperature": "warm sunset", "hex": "#ffcf9a", "intensity": "medium-high" },
                        "fill_light": { "origin": "lower-right", "temperature": "cool violet", "hex": "#5d6aa0", "intensity": "low" },
                        "rim_light": { "origin": "rear-right", "temperature": "neutral", "hex": "#d9dfe8", "intensity": "subtle" },
                        "atmosphere": "slight volumetric haze softening edges"
                    },
                    "textures": {
                        "primary_surface": "smoothly shaded with gentle specular highlights",
                        "stone": "rough, weathered granite showing micro-pitting",
                        "background": "painterly forest bokeh with smooth colour transitions"
                    },
                    "colours": {
                        "dominant": ["#db831c", "#455877", "#262831"],
                        "secondary": ["#bea788", "#72564b"],
                        "accents": ["#ffffff", "#ffe66d", "#71b0ff"],
                        "background_gradient": ["#4d5e89", "#35476a", "#20304d"]
                    },
                    "shadows": { "type": "soft", "direction": "cast down-right", "edge_softness": "medium", "tint": "#304262" },
                    "strokes": { "outline": "barely visible, darker tone of local colour", "highlight_edge": "#c68c3a", "shadow_edge": "#262831" },
                    "mood": "playful adventure with a hint of curiosity"
                })),
            },
        );

        styles.insert(
            "hyper-realism".to_string(),
            VisualStyle {
                name: "Hyper Realism".to_string(),
                guide: StyleGuide::Structured(json!({
                    "capture": {
                        "camera": { "sensor": "full-frame DSLR", "lens": "35 mm prime", "aperture": "f/1.8", "iso": 200, "shutter": "1/250 s" },
                        "framing": { "orientation": "vertical 9 x 16", "crop": "tight torso-up", "composition": "rule-of-thirds, eye-line on upper third" },
                        "depth_of_field": "shallow - subject tack-sharp, background smoothly defocused (bokeh)"
                    },
                    "lighting": {
                        "key_light": { "type": "hard sunlight or stage spot", "angle": "~30 deg off camera left", "temperature": "warm (~5100 K)", "intensity": "high, crisp highlights" },
                        "fill_light": { "type": "ambient room bounce", "temperature": "neutral", "intensity": "low, gentle shadow lift" },
                        "rim_light": { "presence": "subtle edge glow on hair and shoulders", "temperature": "slightly cool" },
                        "contrast": "high - strong separation between lit subject and darker background"
                    },
                    "colour_grade": {
                        "dominant_palette": ["#f4c44e", "#1e1e1e", "#3d5a80"],
                        "accent_palette": ["#ffe8c3", "#86c1ff"],
                        "saturation": "vivid yet natural",
                        "dynamic_range": "wide - retains highlight detail and deep shadows"
                    },
                    "texture_and_detail": {
                        "surface_render": "hyper-real, micro-details retained (skin pores, fabric weave)",
                        "noise": "minimal - clean image with slight filmic grain only in shadows",
                        "sharpening": "edge-aware, no halos"
                    },
                    "overall_aesthetic": {
                        "look": "editorial-quality lifestyle / tech-talk photo",
                        "mood": "energetic and professional",
                        "authenticity": "appears shot in real-world conditions rather than CGI"
                    }
                })),
            },
        );

        Self { styles }
    }

    /// Look up a style by tag.
    pub fn get(&self, tag: &str) -> Option<&VisualStyle> {
        self.styles.get(tag)
    }

    /// Register or replace a style.
    pub fn insert(&mut self, tag: impl Into<String>, style: VisualStyle) {
        self.styles.insert(tag.into(), style);
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(|k| k.as_str())
    }
}

impl VisualStyle {
    /// Render the guide clause for a scene-image instruction.
    pub fn image_clause(&self) -> String {
        match &self.guide {
            StyleGuide::Structured(value) => format!(
                "The image must conform to the following style guide (in JSON format): {}",
                serde_json::to_string_pretty(value).unwrap_or_default()
            ),
            StyleGuide::Text(text) => format!("The image must be in {}.", text),
        }
    }

    /// Render the guide clause for a character-portrait instruction.
    pub fn portrait_clause(&self) -> String {
        match &self.guide {
            StyleGuide::Structured(value) => format!(
                "Style: {}",
                serde_json::to_string_pretty(value).unwrap_or_default()
            ),
            StyleGuide::Text(text) => format!("Style: {}.", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_styles_present() {
        let styles = VisualStyles::builtin();
        for tag in ["pixar", "painted-animation", "hyper-realism"] {
            assert!(styles.get(tag).is_some(), "missing builtin style {tag}");
        }
        assert!(styles.get("vaporwave").is_none());
    }

    #[test]
    fn test_structured_guide_serialized_verbatim() {
        let styles = VisualStyles::builtin();
        let clause = styles.get("pixar").unwrap().image_clause();
        assert!(clause.contains("style guide (in JSON format)"));
        assert!(clause.contains("overallLook"));
    }

    #[test]
    fn test_text_guide_interpolated() {
        let style = VisualStyle {
            name: "Sketch".to_string(),
            guide: StyleGuide::Text("rough pencil sketch style".to_string()),
        };
        assert_eq!(
            style.image_clause(),
            "The image must be in rough pencil sketch style."
        );
    }
}
