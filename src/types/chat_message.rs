use serde::{Deserialize, Serialize};

/// Role of the author of a chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System role.
    System,

    /// User role.
    #[default]
    User,

    /// Assistant role.
    Assistant,
}

/// A single message exchanged with the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChatMessage {
    /// The role of the message author.
    #[serde(default)]
    pub role: ChatRole,

    /// The text of the message.  For streamed responses this is a single fragment.
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    /// Create a new `ChatMessage` with the given role and content.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

impl From<&str> for ChatMessage {
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<String> for ChatMessage {
    fn from(content: String) -> Self {
        Self::user(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase_role() {
        let message = ChatMessage::user("hi");
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn missing_fields_default() {
        let message: ChatMessage = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert_eq!(message.role, ChatRole::User);
        assert_eq!(message.content, "x");
    }
}
