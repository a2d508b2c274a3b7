//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending prompts
//! to the model.

use crate::interpreter::InterpreterMode;

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Change the model.
    Model(String),

    /// Switch to code mode, optionally naming the programming language.
    Code(Option<String>),

    /// Switch to text mode.
    Text,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

impl ChatCommand {
    /// The mode this command switches to, if it switches at all.
    pub fn mode(&self) -> Option<InterpreterMode> {
        match self {
            ChatCommand::Code(_) => Some(InterpreterMode::Code),
            ChatCommand::Text => Some(InterpreterMode::Text),
            _ => None,
        }
    }
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular prompt.
///
/// # Examples
///
/// ```
/// # use goblln::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model codellama").is_some());
/// assert!(parse_command("Hello, Goblln!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "code" => ChatCommand::Code(argument.map(|s| s.to_string())),
        "text" => match argument {
            None => ChatCommand::Text,
            Some(_) => ChatCommand::Invalid("/text takes no argument".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /model <name>          Change the model (e.g., /model codellama)
  /code [language]       Answer with code only (e.g., /code rust)
  /text                  Answer with plain text
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while an answer streams to stop it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model codellama:7b"),
            Some(ChatCommand::Model("codellama:7b".to_string()))
        );
        assert_eq!(
            parse_command("/MODEL   mistral  "),
            Some(ChatCommand::Model("mistral".to_string()))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(
                "/model requires a model name".to_string()
            ))
        );
    }

    #[test]
    fn parse_modes() {
        assert_eq!(parse_command("/code"), Some(ChatCommand::Code(None)));
        assert_eq!(
            parse_command("/code rust"),
            Some(ChatCommand::Code(Some("rust".to_string())))
        );
        assert_eq!(parse_command("/text"), Some(ChatCommand::Text));
        assert!(matches!(
            parse_command("/text rust"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("no argument")
        ));
        assert_eq!(
            parse_command("/code go").and_then(|c| c.mode()),
            Some(InterpreterMode::Code)
        );
        assert_eq!(ChatCommand::Help.mode(), None);
    }

    #[test]
    fn parse_stats_and_config() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/clear"),
            Some(ChatCommand::Invalid("Unknown command: /clear".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello, Goblln!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/model"));
        assert!(help.contains("/code"));
    }
}
