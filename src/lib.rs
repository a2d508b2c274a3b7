// Public modules
pub mod assistant;
pub mod backend;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod language;
pub mod ndjson;
pub mod observability;
pub mod parser;
pub mod render;
pub mod types;
pub mod utils;

// Re-exports
pub use assistant::Goblln;
pub use backend::{AbortHandle, Backend, ChatStream};
pub use client::Ollama;
pub use client_logger::{ClientLogger, JsonLinesLogger};
pub use config::{AssistantConfig, OllamaOptions};
pub use error::{Error, Result};
pub use interpreter::{
    DEFAULT_MESSAGE, EventStream, Interpretation, InterpreterMode, StopKind, StopPhrase,
    TokenEvent, TokenHandler, events, interpret,
};
pub use observability::register_biometrics;
pub use parser::{Block, ParsedAnswer, parse};
pub use types::*;
