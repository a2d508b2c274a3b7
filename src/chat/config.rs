//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and resolves the
//! arguments against the configuration file and environment.

use arrrg_derive::CommandLine;

use crate::config::{AssistantConfig, parse_timeout};
use crate::error::Result;
use crate::interpreter::InterpreterMode;

/// Command-line arguments for the goblln-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemma2)", "MODEL")]
    pub model: Option<String>,

    /// Ollama host.
    #[arrrg(optional, "Ollama host (default: 127.0.0.1:11434)", "HOST")]
    pub ollama_host: Option<String>,

    /// Proxy for requests to Ollama.
    #[arrrg(optional, "Proxy URL for requests to Ollama", "URL")]
    pub ollama_proxy: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Seconds to wait for an answer.
    #[arrrg(optional, "Give up on an answer after this many seconds", "SECONDS")]
    pub timeout: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Connection, model and output settings.
    pub assistant: AssistantConfig,

    /// How answers are interpreted when the session starts.
    pub mode: InterpreterMode,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            assistant: AssistantConfig::new(),
            mode: InterpreterMode::Text,
        }
    }

    /// Resolve arguments over the configuration file and the environment.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let base = match args.config.as_deref() {
            Some(path) => AssistantConfig::from_file(path)?,
            None => AssistantConfig::new(),
        };
        Self::resolve(base.with_env(), args)
    }

    fn resolve(mut assistant: AssistantConfig, args: ChatArgs) -> Result<Self> {
        if let Some(model) = args.model {
            assistant.ollama.model = model;
        }
        if let Some(host) = args.ollama_host {
            assistant.ollama.host = host;
        }
        if args.ollama_proxy.is_some() {
            assistant.ollama.proxy = args.ollama_proxy;
        }
        if let Some(timeout) = args.timeout.as_deref() {
            assistant = assistant.with_timeout(Some(parse_timeout(timeout)?));
        }
        if args.no_color {
            assistant = assistant.without_color();
        }
        assistant.validate()?;
        Ok(Self {
            assistant,
            mode: InterpreterMode::Text,
        })
    }

    /// Sets the starting mode.
    pub fn with_mode(mut self, mode: InterpreterMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
