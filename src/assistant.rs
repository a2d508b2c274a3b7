use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::{AbortHandle, Backend};
use crate::client::Ollama;
use crate::client_logger::JsonLinesLogger;
use crate::config::AssistantConfig;
use crate::error::{Error, Result};
use crate::interpreter::{Interpretation, InterpreterMode, TokenHandler, interpret};
use crate::language::{
    DEFAULT_NATURAL_LANGUAGE, DEFAULT_PROGRAMMING_LANGUAGE, fence_tag, natural_language_name,
    programming_language_name,
};
use crate::observability::INTERPRETER_TIMEOUTS;
use crate::parser::parse;
use crate::types::ChatRequest;

/// The assistant: turns tasks into prompts and streamed answers into results.
///
/// One answer is in flight at a time.  [`Goblln::abort`] (or a clone of
/// [`Goblln::abort_handle`]) cancels it from anywhere.
pub struct Goblln<B: Backend> {
    backend: B,
    model: String,
    timeout: Option<Duration>,
    abort: AbortHandle,
}

impl Goblln<Ollama> {
    /// Connect to the Ollama server described by `config`.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let mut client = Ollama::new(&config.ollama)?;
        if let Some(path) = config.log_file.as_deref() {
            client = client.with_logger(Arc::new(JsonLinesLogger::create(path)?));
        }
        Ok(Self::new(client, config.ollama.model.clone()).with_timeout(config.timeout()))
    }
}

impl<B: Backend> Goblln<B> {
    /// An assistant that asks `model` on `backend`.
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout: None,
            abort: AbortHandle::new(),
        }
    }

    /// Give up on answers that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A handle that cancels the answer in flight.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Cancel the answer in flight.  Returns true if there was one.
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    /// Send `prompt` and interpret the answer in `mode`.
    ///
    /// The timeout covers the whole answer, from sending the request to the last fragment.
    /// An abort, before or during the answer, is an [`Error::Abort`].
    pub async fn run(
        &self,
        prompt: &str,
        mode: InterpreterMode,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<Interpretation> {
        let started = Instant::now();
        let token = self.abort.begin();
        let request = ChatRequest::single_turn(self.model.clone(), prompt);
        let opening = async {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::abort("the request was aborted")),
                opened = self.backend.chat(request) => opened,
            }
        };
        let opened = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, opening).await {
                Ok(opened) => opened,
                Err(_) => {
                    INTERPRETER_TIMEOUTS.click();
                    token.cancel();
                    return Ok(Interpretation::TimedOut);
                }
            },
            None => opening.await,
        };
        let stream = match opened {
            Ok(stream) => stream.with_cancellation_token(token),
            Err(err) => {
                token.cancel();
                return Err(err);
            }
        };
        let remaining = self
            .timeout
            .map(|limit| limit.saturating_sub(started.elapsed()));
        interpret(stream, mode, handler, remaining).await
    }

    /// Send `prompt` as is.
    pub async fn chat(
        &self,
        prompt: &str,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        Ok(self
            .run(prompt, InterpreterMode::Text, handler)
            .await?
            .into_message())
    }

    /// Write code in `language` that does what `description` says.
    pub async fn generate(
        &self,
        description: &str,
        language: Option<&str>,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let language = programming_language(language);
        let prompt = format!(
            "Please write {language} source code.\n\n\
             Here is a description of what the source code should achieve:\n\n{}",
            description.trim()
        );
        let interpretation = self.run(&prompt, InterpreterMode::Code, handler).await?;
        Ok(match interpretation {
            Interpretation::Answer(answer) => extract_code(answer),
            other => other.into_message(),
        })
    }

    /// Explain the problems in `source`.  Returns `source` when the model finds none.
    pub async fn debug(
        &self,
        source: &str,
        language: Option<&str>,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let language = programming_language(language);
        let prompt = format!(
            "Please debug the following {language} source code:\n\n{}",
            fenced(&fence_tag(&language), source)
        );
        let interpretation = self.run(&prompt, InterpreterMode::Text, handler).await?;
        Ok(answer_or(interpretation, source))
    }

    /// Correct `source`, optionally given the `error` it produces.  Returns the corrected code,
    /// or `source` when the model has nothing to change.
    pub async fn fix(
        &self,
        source: &str,
        language: Option<&str>,
        error: Option<&str>,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let language = programming_language(language);
        let mut prompt = format!(
            "Please correct the following {language} source code:\n\n{}",
            fenced(&fence_tag(&language), source)
        );
        if let Some(error) = error.map(str::trim).filter(|e| !e.is_empty()) {
            prompt.push_str("\n\nHere is the error:\n\n");
            prompt.push_str(error);
        }
        let interpretation = self.run(&prompt, InterpreterMode::Code, handler).await?;
        Ok(code_or(interpretation, source))
    }

    /// Analyze arbitrary input.
    pub async fn analyze(
        &self,
        input: &str,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let prompt = format!("Please analyze the following:\n\n{}", fenced("", input));
        let interpretation = self.run(&prompt, InterpreterMode::Text, handler).await?;
        Ok(answer_or(interpretation, input))
    }

    /// Summarize a document.
    pub async fn summarize(
        &self,
        content: &str,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let prompt = format!("Please summarize the following:\n\n{}", fenced("md", content));
        let interpretation = self.run(&prompt, InterpreterMode::Text, handler).await?;
        Ok(answer_or(interpretation, content))
    }

    /// Translate `source` from one programming language to another.
    pub async fn translate(
        &self,
        source: &str,
        from: Option<&str>,
        to: &str,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let from = programming_language(from);
        let to = programming_language_name(to);
        let prompt = format!(
            "Please translate the following {from} source code to {to}:\n\n{}",
            fenced(&fence_tag(&from), source)
        );
        let interpretation = self.run(&prompt, InterpreterMode::Code, handler).await?;
        Ok(code_or(interpretation, source))
    }

    /// Rewrite a document in a natural language (English by default).
    pub async fn rewrite(
        &self,
        document: &str,
        language: Option<&str>,
        handler: Option<&mut dyn TokenHandler>,
    ) -> Result<String> {
        let language = language
            .map(natural_language_name)
            .unwrap_or_else(|| DEFAULT_NATURAL_LANGUAGE.to_string());
        let prompt = format!(
            "Please rewrite the following document in {language}.\n\n{}",
            fenced("md", document)
        );
        let interpretation = self.run(&prompt, InterpreterMode::Text, handler).await?;
        Ok(answer_or(interpretation, document))
    }
}

fn programming_language(language: Option<&str>) -> String {
    language
        .map(programming_language_name)
        .unwrap_or_else(|| DEFAULT_PROGRAMMING_LANGUAGE.to_string())
}

fn fenced(tag: &str, body: &str) -> String {
    format!("```{tag}\n{}\n```", body.trim())
}

/// Code-mode answers arrive without fences; anything else is parsed for its code.
fn extract_code(answer: String) -> String {
    let parsed = parse(&answer);
    if parsed.has_code() {
        parsed.code
    } else {
        answer
    }
}

fn answer_or(interpretation: Interpretation, input: &str) -> String {
    match interpretation {
        Interpretation::Answer(answer) => answer,
        Interpretation::Stopped(_) | Interpretation::TimedOut => input.to_string(),
    }
}

fn code_or(interpretation: Interpretation, input: &str) -> String {
    match interpretation {
        Interpretation::Answer(answer) => extract_code(answer),
        Interpretation::Stopped(_) | Interpretation::TimedOut => input.to_string(),
    }
}
