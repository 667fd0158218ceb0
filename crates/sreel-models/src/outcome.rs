//! The uniform result shape returned by every pipeline stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stage result surfaced to the caller.
///
/// Partial success is communicated through the message (e.g. "3/4
/// succeeded") rather than a distinct status code, so the caller can choose
/// to proceed with partial results.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StageOutcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> StageOutcome<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_shapes() {
        let ok: StageOutcome<u32> = StageOutcome::ok("3/4 succeeded", 3);
        assert!(ok.success);
        assert_eq!(ok.data, Some(3));

        let err: StageOutcome<u32> = StageOutcome::err("all failed");
        assert!(!err.success);
        assert!(err.data.is_none());
    }
}
