//! Interactive chat with a model served by Ollama.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! goblln-chat
//!
//! # Specify a model and server
//! goblln-chat --model codellama --ollama-host http://gpu-box:11434
//!
//! # Disable colors (useful for piping output)
//! goblln-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/model <name>` - Change the model
//! - `/code [language]` - Answer with code only
//! - `/text` - Answer with plain text
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use arrrg::CommandLine;

use goblln::chat::{ChatArgs, ChatConfig, run_interactive};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("goblln-chat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    run_interactive(config).await?;
    Ok(())
}
