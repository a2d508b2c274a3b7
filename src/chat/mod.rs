//! Chat application module for interactive conversations with a local model.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! goblln library. It supports:
//!
//! - Streaming responses with real-time token display
//! - Text and code answer modes
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Chat session state and prompt dispatch
//! - [`commands`]: Slash command parsing
//! - [`repl`]: The interactive loop

mod commands;
mod config;
mod repl;
mod session;

pub use crate::render::PlainTextRenderer;
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use repl::{Flow, handle_command, run_interactive};
pub use session::{ChatSession, SessionStats};
