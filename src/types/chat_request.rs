use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Parameters for a call to the `/api/chat` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// The model name, e.g. `gemma2` or `codellama:7b`.
    pub model: String,

    /// The conversation so far.
    pub messages: Vec<ChatMessage>,

    /// Whether the server should stream the response.
    pub stream: bool,

    /// How long the server keeps the model loaded after the request, e.g. `5m`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

impl ChatRequest {
    /// Create a streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            keep_alive: None,
        }
    }

    /// Create a streaming request holding a single user prompt.
    pub fn single_turn(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model, vec![ChatMessage::user(prompt)])
    }

    /// Sets the keep-alive duration.
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    /// Returns the content of the last user message, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_turn_request_shape() {
        let request = ChatRequest::single_turn("gemma2", "Hello");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gemma2",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
        assert_eq!(request.prompt(), Some("Hello"));
    }

    #[test]
    fn keep_alive_serialized_when_set() {
        let request = ChatRequest::single_turn("gemma2", "Hello").with_keep_alive("10m");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["keep_alive"], "10m");
    }
}
