//! Transcription stage.

use tracing::info;

use sreel_models::TranscriptUnit;
use sreel_providers::{AudioFormat, SpeechToText};

use crate::error::{PipelineError, PipelineResult};

/// Transcribe an audio track, enforcing the upload size limit before any
/// bytes leave the process.
pub async fn transcribe_audio(
    speech: &dyn SpeechToText,
    audio: Vec<u8>,
    format: AudioFormat,
    max_bytes: usize,
) -> PipelineResult<Vec<TranscriptUnit>> {
    if audio.is_empty() {
        return Err(PipelineError::validation("Audio file is required."));
    }
    if audio.len() > max_bytes {
        return Err(PipelineError::validation(format!(
            "File size must be less than {}MB.",
            max_bytes / (1024 * 1024)
        )));
    }

    let units = speech.transcribe(audio, format).await?;
    if units.is_empty() {
        return Err(PipelineError::empty_result(
            "transcription produced no segments",
        ));
    }

    info!("Transcribed {} units", units.len());
    Ok(units)
}

/// The transcript as one string, the form the LLM stages consume.
pub fn full_text(units: &[TranscriptUnit]) -> String {
    units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSpeech;

    fn units() -> Vec<TranscriptUnit> {
        vec![
            TranscriptUnit {
                text: "hello".to_string(),
                start: 0.0,
                end: 2.0,
            },
            TranscriptUnit {
                text: "world".to_string(),
                start: 2.0,
                end: 4.0,
            },
        ]
    }

    #[tokio::test]
    async fn test_transcribe_within_limit() {
        let speech = FakeSpeech::returning(units());
        let result = transcribe_audio(&speech, vec![0u8; 1024], AudioFormat::Mp3, 25 * 1024 * 1024)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(full_text(&result), "hello world");
    }

    #[tokio::test]
    async fn test_oversized_audio_rejected_locally() {
        let speech = FakeSpeech::returning(units());
        let err = transcribe_audio(&speech, vec![0u8; 1025], AudioFormat::Mp3, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_audio_rejected() {
        let speech = FakeSpeech::returning(units());
        let err = transcribe_audio(&speech, Vec::new(), AudioFormat::Mp3, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
