//! The interactive read-eval-print loop shared by the command-line tools.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::assistant::Goblln;
use crate::backend::Backend;
use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::config::ChatConfig;
use crate::chat::session::ChatSession;
use crate::error::{Error, Result};
use crate::interpreter::DEFAULT_MESSAGE;
use crate::language::DEFAULT_PROGRAMMING_LANGUAGE;
use crate::render::PlainTextRenderer;

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run an interactive chat until `/quit` or end of input.
///
/// Ctrl+C while an answer streams stops that answer; at the prompt it clears the line.
pub async fn run_interactive(config: ChatConfig) -> Result<()> {
    let goblln = Goblln::from_config(&config.assistant)?;
    let mut session = ChatSession::new(goblln, config.mode);
    let mut renderer = PlainTextRenderer::with_color(config.assistant.use_color);
    let mut rl = DefaultEditor::new()
        .map_err(|e| Error::unknown(format!("failed to start line editor: {e}")))?;

    let abort = session.abort_handle();
    ctrlc::set_handler(move || {
        abort.abort();
    })
    .map_err(|e| Error::unknown(format!("failed to install Ctrl+C handler: {e}")))?;

    println!("Goblln Chat (model: {})", session.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if handle_command(cmd, &config, &mut session, &mut renderer)? == Flow::Quit {
                        break;
                    }
                    continue;
                }

                println!("Goblln:");
                match session.send_streaming(line, &mut renderer).await {
                    Ok(answer) if answer == DEFAULT_MESSAGE => renderer.print_info(DEFAULT_MESSAGE)?,
                    Ok(_) => renderer.finish_response()?,
                    Err(e) if e.is_abort() => renderer.print_interrupted()?,
                    Err(e) => renderer.print_error(&e.to_string())?,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err))?;
                break;
            }
        }
    }

    Ok(())
}

/// Apply one slash command to the session.
pub fn handle_command<B: Backend, W: std::io::Write + Send>(
    cmd: ChatCommand,
    config: &ChatConfig,
    session: &mut ChatSession<B>,
    renderer: &mut PlainTextRenderer<W>,
) -> Result<Flow> {
    match cmd {
        ChatCommand::Quit => {
            renderer.print_info("Goodbye!")?;
            return Ok(Flow::Quit);
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                renderer.print_info(&format!("    {}", line))?;
            }
        }
        ChatCommand::Model(model) => {
            session.set_model(model.clone());
            renderer.print_info(&format!("Model changed to: {}", model))?;
        }
        ChatCommand::Code(language) => {
            session.set_code_mode(language);
            let language = session
                .language_name()
                .unwrap_or_else(|| DEFAULT_PROGRAMMING_LANGUAGE.to_string());
            renderer.print_info(&format!("Code mode ({language})."))?;
        }
        ChatCommand::Text => {
            session.set_text_mode();
            renderer.print_info("Text mode.")?;
        }
        ChatCommand::Stats => {
            let stats = session.stats();
            renderer.print_info("    Session Statistics:")?;
            renderer.print_info(&format!("      Model: {}", stats.model))?;
            renderer.print_info(&format!("      Mode: {}", stats.mode))?;
            renderer.print_info(&format!("      Prompts: {}", stats.requests))?;
            renderer.print_info(&format!("      Unanswered: {}", stats.unanswered))?;
            renderer.print_info(&format!("      Failed: {}", stats.failures))?;
        }
        ChatCommand::ShowConfig => {
            let assistant = &config.assistant;
            renderer.print_info("    Current Configuration:")?;
            renderer.print_info(&format!("      Model: {}", session.model()))?;
            renderer.print_info(&format!("      Host: {}", assistant.ollama.host))?;
            renderer.print_info(&format!(
                "      Proxy: {}",
                assistant.ollama.proxy.as_deref().unwrap_or("(none)")
            ))?;
            let timeout = assistant
                .timeout()
                .map(|t| format!("{:.1}s", t.as_secs_f64()))
                .unwrap_or_else(|| "(none)".to_string());
            renderer.print_info(&format!("      Timeout: {}", timeout))?;
            renderer.print_info(&format!("      Mode: {}", session.mode()))?;
            renderer.print_info(&format!(
                "      Language: {}",
                session
                    .language_name()
                    .unwrap_or_else(|| "(default)".to_string())
            ))?;
        }
        ChatCommand::Invalid(message) => {
            renderer.print_error(&message)?;
        }
    }
    Ok(Flow::Continue)
}
