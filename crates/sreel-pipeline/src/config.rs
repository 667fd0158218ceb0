//! Pipeline configuration.

use std::time::Duration;

/// Tunables for the generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest audio payload accepted for transcription
    pub max_audio_bytes: usize,
    /// Hard cap on scene prompts per storyline
    pub max_scene_prompts: usize,
    /// First render poll happens this long after submission
    pub poll_initial_interval: Duration,
    /// Poll interval ceiling once backoff has grown it
    pub poll_max_interval: Duration,
    /// A job still not terminal after this long is marked failed
    pub poll_max_lifetime: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_audio_bytes: 25 * 1024 * 1024,
            max_scene_prompts: 20,
            poll_initial_interval: Duration::from_secs(5),
            poll_max_interval: Duration::from_secs(60),
            poll_max_lifetime: Duration::from_secs(600),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_audio_bytes: env_parse("PIPELINE_MAX_AUDIO_BYTES", defaults.max_audio_bytes),
            max_scene_prompts: env_parse("PIPELINE_MAX_SCENE_PROMPTS", defaults.max_scene_prompts),
            poll_initial_interval: Duration::from_secs(env_parse(
                "PIPELINE_POLL_INTERVAL_SECS",
                defaults.poll_initial_interval.as_secs(),
            )),
            poll_max_interval: Duration::from_secs(env_parse(
                "PIPELINE_POLL_MAX_INTERVAL_SECS",
                defaults.poll_max_interval.as_secs(),
            )),
            poll_max_lifetime: Duration::from_secs(env_parse(
                "PIPELINE_POLL_MAX_LIFETIME_SECS",
                defaults.poll_max_lifetime.as_secs(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_audio_bytes, 25 * 1024 * 1024);
        assert_eq!(config.max_scene_prompts, 20);
        assert_eq!(config.poll_initial_interval, Duration::from_secs(5));
        assert_eq!(config.poll_max_lifetime, Duration::from_secs(600));
    }
}
