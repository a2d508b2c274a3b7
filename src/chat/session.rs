//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which holds the session's mode and
//! counters and sends each prompt through a [`Goblln`] assistant.

use crate::assistant::Goblln;
use crate::backend::{AbortHandle, Backend};
use crate::error::Result;
use crate::interpreter::{DEFAULT_MESSAGE, InterpreterMode, TokenHandler};
use crate::language::programming_language_name;

/// A chat session.  Every prompt is answered independently; nothing is remembered between
/// turns.
pub struct ChatSession<B: Backend> {
    goblln: Goblln<B>,
    mode: InterpreterMode,
    language: Option<String>,
    requests: u64,
    unanswered: u64,
    failures: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The model answering prompts.
    pub model: String,
    /// The current mode.
    pub mode: InterpreterMode,
    /// The programming language used in code mode, if set.
    pub language: Option<String>,
    /// Prompts sent.
    pub requests: u64,
    /// Prompts answered with the fallback message.
    pub unanswered: u64,
    /// Prompts that failed with an error.
    pub failures: u64,
}

impl<B: Backend> ChatSession<B> {
    /// Creates a new chat session in `mode`.
    pub fn new(goblln: Goblln<B>, mode: InterpreterMode) -> Self {
        Self {
            goblln,
            mode,
            language: None,
            requests: 0,
            unanswered: 0,
            failures: 0,
        }
    }

    /// A handle that stops the answer being streamed.
    pub fn abort_handle(&self) -> AbortHandle {
        self.goblln.abort_handle()
    }

    pub fn model(&self) -> &str {
        self.goblln.model()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.goblln.set_model(model);
    }

    pub fn mode(&self) -> InterpreterMode {
        self.mode
    }

    /// Switch to code mode.  `language` replaces the current language when given.
    pub fn set_code_mode(&mut self, language: Option<String>) {
        self.mode = InterpreterMode::Code;
        if let Some(language) = language {
            self.language = Some(language);
        }
    }

    pub fn set_text_mode(&mut self) {
        self.mode = InterpreterMode::Text;
    }

    /// The display name of the code-mode language.
    pub fn language_name(&self) -> Option<String> {
        self.language.as_deref().map(programming_language_name)
    }

    /// Send `input` and stream the answer to `handler`.
    ///
    /// In text mode the prompt is sent as is.  In code mode it describes code to write in the
    /// session's language.
    pub async fn send_streaming(
        &mut self,
        input: &str,
        handler: &mut dyn TokenHandler,
    ) -> Result<String> {
        self.requests += 1;
        let answer = match self.mode {
            InterpreterMode::Text => self.goblln.chat(input, Some(handler)).await,
            InterpreterMode::Code => {
                self.goblln
                    .generate(input, self.language.as_deref(), Some(handler))
                    .await
            }
        };
        match &answer {
            Ok(text) if text == DEFAULT_MESSAGE => self.unanswered += 1,
            Ok(_) => {}
            Err(err) if err.is_abort() => {}
            Err(_) => self.failures += 1,
        }
        answer
    }

    /// Returns statistics for the session so far.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.goblln.model().to_string(),
            mode: self.mode,
            language: self.language_name(),
            requests: self.requests,
            unanswered: self.unanswered,
            failures: self.failures,
        }
    }
}
