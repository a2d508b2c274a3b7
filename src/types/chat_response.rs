use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::ChatMessage;

/// One line of a streamed `/api/chat` response.
///
/// Every line carries a message fragment.  The last line has `done` set and carries the
/// timing statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatResponse {
    /// The model that produced the fragment.
    #[serde(default)]
    pub model: String,

    /// When the fragment was produced.
    #[serde(
        default,
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,

    /// The message fragment.
    #[serde(default)]
    pub message: ChatMessage,

    /// Whether this is the last line of the stream.
    #[serde(default)]
    pub done: bool,

    /// Why the generation ended, e.g. `stop` or `length`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,

    /// Total time spent on the request, in nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,

    /// Number of tokens in the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,

    /// Number of tokens in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl ChatResponse {
    /// Create a non-final response carrying one assistant fragment.
    pub fn fragment(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(content),
            ..Default::default()
        }
    }

    /// The fragment text.
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fragment_line() {
        let line = r#"{"model":"gemma2","created_at":"2024-07-01T12:00:00.123456Z","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let response: ChatResponse = serde_json::from_str(line).unwrap();
        assert_eq!(response.model, "gemma2");
        assert_eq!(response.content(), "Hel");
        assert!(!response.done);
        assert!(response.created_at.is_some());
    }

    #[test]
    fn parse_final_line() {
        let line = r#"{"model":"gemma2","created_at":"2024-07-01T12:00:01Z","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","total_duration":5000,"prompt_eval_count":12,"eval_count":34}"#;
        let response: ChatResponse = serde_json::from_str(line).unwrap();
        assert!(response.done);
        assert_eq!(response.done_reason.as_deref(), Some("stop"));
        assert_eq!(response.eval_count, Some(34));
    }
}
