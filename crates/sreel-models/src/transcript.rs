//! Transcript units returned by the speech-to-text stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One time-stamped unit of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptUnit {
    pub text: String,
    /// Start offset in seconds from the beginning of the track
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
}

impl TranscriptUnit {
    /// Render the unit's range as "MM:SS - MM:SS".
    pub fn timestamp_range(&self) -> String {
        format_timestamp_range(self.start, self.end)
    }
}

/// Format a start/end pair of second offsets as "MM:SS - MM:SS".
pub fn format_timestamp_range(start: f64, end: f64) -> String {
    format!("{} - {}", format_offset(start), format_offset(end))
}

fn format_offset(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_range() {
        assert_eq!(format_timestamp_range(8.2, 14.9), "00:08 - 00:14");
        assert_eq!(format_timestamp_range(65.0, 125.5), "01:05 - 02:05");
        assert_eq!(format_timestamp_range(0.0, 0.4), "00:00 - 00:00");
    }

    #[test]
    fn test_unit_range() {
        let unit = TranscriptUnit {
            text: "hello".to_string(),
            start: 60.0,
            end: 61.0,
        };
        assert_eq!(unit.timestamp_range(), "01:00 - 01:01");
    }
}
