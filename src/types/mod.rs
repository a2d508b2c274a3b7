//! Wire types for the Ollama chat endpoint.

mod chat_message;
mod chat_request;
mod chat_response;

pub use chat_message::{ChatMessage, ChatRole};
pub use chat_request::ChatRequest;
pub use chat_response::ChatResponse;
