//! Interprets a streamed chat answer fragment by fragment.
//!
//! The [`Interpreter`] is a synchronous classifier: every fragment fed to it yields a
//! [`Step`] saying whether something should be shown, whether the answer is complete, or
//! whether the model said something that means there is nothing useful to show.  Two drivers
//! run it over a [`ChatStream`]:
//!
//! - [`EventStream`] pulls classified [`TokenEvent`]s one at a time;
//! - [`interpret`] pushes them to a [`TokenHandler`] and returns the final [`Interpretation`].
//!
//! In [`InterpreterMode::Code`] everything outside the first fenced block is dropped, so the
//! answer is the code alone.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::backend::ChatStream;
use crate::error::{Error, Result};
use crate::observability::{
    INTERPRETER_ABORTS, INTERPRETER_DURATION, INTERPRETER_EMITTED, INTERPRETER_FENCES,
    INTERPRETER_STOP_PHRASES, INTERPRETER_TIMEOUTS,
};
use crate::parser::FENCE;

/// The answer given in place of content when the model had nothing usable to say.
pub const DEFAULT_MESSAGE: &str = "Goblln is unable to process this request.";

const SENTENCE_DELIMITERS: [char; 3] = ['.', '?', '!'];

/// Models like to append usage examples after the requested code.
const EXAMPLE_MARKER: &str = "// example";

///////////////////////////////////////////// Mode /////////////////////////////////////////////

/// How fragments are filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterMode {
    /// Pass everything through.
    #[default]
    Text,
    /// Keep only the contents of the first fenced block.
    Code,
}

impl fmt::Display for InterpreterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterMode::Text => write!(f, "text"),
            InterpreterMode::Code => write!(f, "code"),
        }
    }
}

impl FromStr for InterpreterMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(InterpreterMode::Text),
            "code" => Ok(InterpreterMode::Code),
            _ => Err(Error::validation(
                format!("Invalid mode: {s}. Valid options: text, code"),
                Some("mode".to_string()),
            )),
        }
    }
}

///////////////////////////////////////// Stop phrases /////////////////////////////////////////

/// What a stop phrase means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    /// The model found nothing to change in the input.
    NothingToChange,
    /// The model declined to answer.
    Refusal,
}

/// A phrase that ends the answer as soon as it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopPhrase {
    /// "actually correct"
    ActuallyCorrect,
    /// "already correct"
    AlreadyCorrect,
    /// "cannot provide"
    CannotProvide,
    /// "can't provide"
    CantProvide,
    /// "unable to provide"
    UnableToProvide,
}

impl StopPhrase {
    /// Every stop phrase, in matching order.
    pub const ALL: [StopPhrase; 5] = [
        StopPhrase::ActuallyCorrect,
        StopPhrase::AlreadyCorrect,
        StopPhrase::CannotProvide,
        StopPhrase::CantProvide,
        StopPhrase::UnableToProvide,
    ];

    /// The lower-case phrase.
    pub fn as_str(&self) -> &'static str {
        match self {
            StopPhrase::ActuallyCorrect => "actually correct",
            StopPhrase::AlreadyCorrect => "already correct",
            StopPhrase::CannotProvide => "cannot provide",
            StopPhrase::CantProvide => "can't provide",
            StopPhrase::UnableToProvide => "unable to provide",
        }
    }

    /// What the phrase means.
    pub fn kind(&self) -> StopKind {
        match self {
            StopPhrase::ActuallyCorrect | StopPhrase::AlreadyCorrect => StopKind::NothingToChange,
            StopPhrase::CannotProvide | StopPhrase::CantProvide | StopPhrase::UnableToProvide => {
                StopKind::Refusal
            }
        }
    }

    /// Find the first stop phrase contained in an already lower-cased line.
    pub fn find(line_lower_case: &str) -> Option<StopPhrase> {
        Self::ALL
            .into_iter()
            .find(|phrase| line_lower_case.contains(phrase.as_str()))
    }
}

impl fmt::Display for StopPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//////////////////////////////////////////// Events ////////////////////////////////////////////

/// One emitted fragment and the line context it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenEvent {
    /// The emitted text.
    pub token: String,
    /// The last completed line, trailing whitespace trimmed.
    pub line: String,
    /// Lower-case view of the line in progress, or of `line` when nothing is in progress.
    pub line_lower_case: String,
    /// Whether `token` contains a newline.
    pub is_new_line: bool,
}

/// Receives emitted fragments in order.
///
/// Each call is awaited before the next fragment is read, so a slow handler slows the stream
/// down rather than buffering it.
#[async_trait::async_trait]
pub trait TokenHandler: Send {
    /// Handle one emitted fragment.  An error ends the interpretation with that error.
    async fn on_token(&mut self, event: &TokenEvent) -> Result<()>;
}

#[async_trait::async_trait]
impl TokenHandler for Vec<TokenEvent> {
    async fn on_token(&mut self, event: &TokenEvent) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// How an interpretation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpretation {
    /// The accumulated answer, trimmed.
    Answer(String),
    /// A stop phrase matched; nothing of the answer is kept.
    Stopped(StopPhrase),
    /// The time limit passed before the stream finished.
    TimedOut,
}

impl Interpretation {
    /// Returns true for [`Interpretation::Answer`].
    pub fn is_answer(&self) -> bool {
        matches!(self, Interpretation::Answer(_))
    }

    /// The meaning of the stop phrase, if one matched.
    pub fn stop_kind(&self) -> Option<StopKind> {
        match self {
            Interpretation::Stopped(phrase) => Some(phrase.kind()),
            _ => None,
        }
    }

    /// The answer, or [`DEFAULT_MESSAGE`] when there is none.
    pub fn into_message(self) -> String {
        match self {
            Interpretation::Answer(answer) => answer,
            Interpretation::Stopped(_) | Interpretation::TimedOut => DEFAULT_MESSAGE.to_string(),
        }
    }
}

////////////////////////////////////////// Classifier //////////////////////////////////////////

/// Where the interpreter is relative to the fenced block it extracts in code mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    /// No fence yet; everything is suppressed.
    AwaitingFence,
    /// Right after the opening fence, dropping the language tag up to the newline.
    SkippingLanguageTag,
    /// Between the fences; fragments are emitted.
    InsideCode,
    /// The answer is complete.
    Closed,
}

/// What to do with one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing to deliver.
    Suppressed,
    /// Deliver this event.
    Emit(TokenEvent),
    /// The answer is complete.  Deliver the event first, if any, then stop reading.
    Finish(Option<TokenEvent>),
    /// A stop phrase matched.  Stop reading and discard the answer.
    Stop(StopPhrase),
}

#[derive(Debug, Default)]
struct LineAccumulator {
    current_line: String,
    line: String,
    line_lower_case: String,
}

impl LineAccumulator {
    fn push(&mut self, token: &str) {
        self.current_line.push_str(token);
        if token.contains('\n') || token.contains(SENTENCE_DELIMITERS) {
            self.line = self.current_line.trim_end().to_string();
            self.line_lower_case = self.line.to_lowercase();
            self.current_line.clear();
        } else {
            self.line_lower_case = self.current_line.to_lowercase();
        }
    }
}

/// Classifies fragments of one answer.
#[derive(Debug)]
pub struct Interpreter {
    mode: InterpreterMode,
    fence: FenceState,
    lines: LineAccumulator,
    message: String,
    received: usize,
    code_line_start: usize,
    stopped: Option<StopPhrase>,
}

impl Interpreter {
    /// A fresh interpreter.
    pub fn new(mode: InterpreterMode) -> Self {
        let fence = match mode {
            InterpreterMode::Text => FenceState::InsideCode,
            InterpreterMode::Code => FenceState::AwaitingFence,
        };
        Self {
            mode,
            fence,
            lines: LineAccumulator::default(),
            message: String::new(),
            received: 0,
            code_line_start: 0,
            stopped: None,
        }
    }

    /// The mode this interpreter was created with.
    pub fn mode(&self) -> InterpreterMode {
        self.mode
    }

    /// The current fence state.  Text mode reports [`FenceState::InsideCode`] until finished.
    pub fn fence_state(&self) -> FenceState {
        self.fence
    }

    /// The last completed line.
    pub fn line(&self) -> &str {
        &self.lines.line
    }

    /// The stop phrase that ended the answer, if any.
    pub fn stop_phrase(&self) -> Option<StopPhrase> {
        self.stopped
    }

    /// Returns true once no further fragment will be accepted.
    pub fn is_finished(&self) -> bool {
        self.fence == FenceState::Closed
    }

    /// The answer accumulated so far, trimmed.
    pub fn answer(&self) -> String {
        self.message.trim().to_string()
    }

    /// The result for the fragments seen so far.
    pub fn interpretation(&self) -> Interpretation {
        match self.stopped {
            Some(phrase) => Interpretation::Stopped(phrase),
            None => Interpretation::Answer(self.answer()),
        }
    }

    /// Classify one fragment.
    pub fn feed(&mut self, token: &str) -> Step {
        if self.is_finished() || token.is_empty() {
            return Step::Suppressed;
        }

        // The server tends to open the stream with a bare newline.
        self.received += 1;
        if self.received == 1 && token.chars().all(|c| c == '\n' || c == '\r') {
            self.received = 0;
            return Step::Suppressed;
        }

        self.lines.push(token);
        if let Some(phrase) = StopPhrase::find(&self.lines.line_lower_case) {
            self.stopped = Some(phrase);
            self.fence = FenceState::Closed;
            return Step::Stop(phrase);
        }

        match self.mode {
            InterpreterMode::Text => {
                self.message.push_str(token);
                Step::Emit(self.event(token))
            }
            InterpreterMode::Code => self.feed_code(token),
        }
    }

    fn feed_code(&mut self, token: &str) -> Step {
        match self.fence {
            FenceState::AwaitingFence => match token.find(FENCE) {
                Some(idx) => {
                    self.fence = FenceState::SkippingLanguageTag;
                    self.skip_language_tag(&token[idx + FENCE.len()..])
                }
                None => Step::Suppressed,
            },
            FenceState::SkippingLanguageTag => self.skip_language_tag(token),
            FenceState::InsideCode => match token.find(FENCE) {
                Some(idx) => {
                    self.fence = FenceState::Closed;
                    let before = &token[..idx];
                    if before.is_empty() {
                        Step::Finish(None)
                    } else {
                        match self.push_code(before) {
                            Step::Emit(event) => Step::Finish(Some(event)),
                            step => step,
                        }
                    }
                }
                None => self.push_code(token),
            },
            FenceState::Closed => Step::Suppressed,
        }
    }

    fn skip_language_tag(&mut self, text: &str) -> Step {
        let Some(idx) = text.find('\n') else {
            return Step::Suppressed;
        };
        self.fence = FenceState::InsideCode;
        self.code_line_start = self.message.len();
        let rest = &text[idx + 1..];
        if rest.is_empty() {
            Step::Suppressed
        } else {
            self.feed_code(rest)
        }
    }

    /// Append code, cutting the answer at a completed line that starts a usage example.
    fn push_code(&mut self, text: &str) -> Step {
        let before_len = self.message.len();
        self.message.push_str(text);
        while let Some(rel) = self.message[self.code_line_start..].find('\n') {
            let end = self.code_line_start + rel;
            if self.message[self.code_line_start..end]
                .to_lowercase()
                .contains(EXAMPLE_MARKER)
            {
                self.message.truncate(self.code_line_start);
                self.fence = FenceState::Closed;
                let kept = if self.message.len() > before_len {
                    Some(self.message[before_len..].to_string())
                } else {
                    None
                };
                return Step::Finish(kept.map(|kept| self.event(&kept)));
            }
            self.code_line_start = end + 1;
        }
        Step::Emit(self.event(text))
    }

    fn event(&self, token: &str) -> TokenEvent {
        TokenEvent {
            token: token.to_string(),
            line: self.lines.line.clone(),
            line_lower_case: self.lines.line_lower_case.clone(),
            is_new_line: token.contains('\n'),
        }
    }
}

/////////////////////////////////////////// Drivers ///////////////////////////////////////////

/// Pulls classified events out of a chat stream.
///
/// The stream is cancelled as soon as the interpretation is decided: at the end of the
/// stream, at the closing fence, at a stop phrase, or on a transport error.
pub struct EventStream {
    stream: ChatStream,
    interpreter: Interpreter,
    outcome: Option<Result<Interpretation>>,
}

impl EventStream {
    /// Interpret `stream` in `mode`.
    pub fn new(stream: ChatStream, mode: InterpreterMode) -> Self {
        Self {
            stream,
            interpreter: Interpreter::new(mode),
            outcome: None,
        }
    }

    /// The next emitted event, or `None` once the interpretation is decided.
    pub async fn next(&mut self) -> Option<Result<TokenEvent>> {
        if self.outcome.is_some() {
            return None;
        }
        loop {
            let response = match self.stream.next_event().await {
                Some(Ok(response)) => response,
                Some(Err(err)) => {
                    self.settle(Err(err.clone()), false);
                    return Some(Err(err));
                }
                None => {
                    self.settle(Ok(self.interpreter.interpretation()), false);
                    return None;
                }
            };
            match self.interpreter.feed(response.content()) {
                Step::Suppressed => continue,
                Step::Emit(event) => {
                    INTERPRETER_EMITTED.click();
                    return Some(Ok(event));
                }
                Step::Finish(event) => {
                    INTERPRETER_FENCES.click();
                    self.settle(Ok(self.interpreter.interpretation()), true);
                    if event.is_some() {
                        INTERPRETER_EMITTED.click();
                    }
                    return event.map(Ok);
                }
                Step::Stop(phrase) => {
                    INTERPRETER_STOP_PHRASES.click();
                    self.settle(Ok(Interpretation::Stopped(phrase)), true);
                    return None;
                }
            }
        }
    }

    /// Returns true once the outcome is known.
    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    /// The final interpretation.
    ///
    /// If the stream was not drained this is the interpretation of what was read so far.
    pub fn finish(mut self) -> Result<Interpretation> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => {
                self.stream.abort();
                Ok(self.interpreter.interpretation())
            }
        }
    }

    /// Turn this into a [`Stream`] of events.  The final interpretation is not observable.
    pub fn into_stream(self) -> impl Stream<Item = Result<TokenEvent>> + Send {
        stream::unfold(self, |mut events| async move {
            events.next().await.map(|event| (event, events))
        })
    }

    /// `early` is set when the answer is decided before the server finished sending it.
    fn settle(&mut self, outcome: Result<Interpretation>, early: bool) {
        if early && !self.stream.is_aborted() {
            INTERPRETER_ABORTS.click();
        }
        self.stream.abort();
        self.outcome = Some(outcome);
    }
}

/// The emitted events of `stream` as a pull-based [`Stream`].
pub fn events(stream: ChatStream, mode: InterpreterMode) -> impl Stream<Item = Result<TokenEvent>> + Send {
    EventStream::new(stream, mode).into_stream()
}

/// Interpret `stream`, handing each emitted fragment to `handler` before reading the next.
///
/// With a `timeout`, an answer that takes longer resolves to [`Interpretation::TimedOut`].
/// Fragments already handed to `handler` stay handed.
pub async fn interpret(
    stream: ChatStream,
    mode: InterpreterMode,
    handler: Option<&mut dyn TokenHandler>,
    timeout: Option<Duration>,
) -> Result<Interpretation> {
    let start = Instant::now();
    let run = drive(EventStream::new(stream, mode), handler);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(outcome) => outcome,
            Err(_) => {
                INTERPRETER_TIMEOUTS.click();
                Ok(Interpretation::TimedOut)
            }
        },
        None => run.await,
    };
    INTERPRETER_DURATION.add(start.elapsed().as_secs_f64());
    outcome
}

/// Like [`interpret`], returning [`DEFAULT_MESSAGE`] in place of a missing answer.
pub async fn interpret_message(
    stream: ChatStream,
    mode: InterpreterMode,
    handler: Option<&mut dyn TokenHandler>,
    timeout: Option<Duration>,
) -> Result<String> {
    Ok(interpret(stream, mode, handler, timeout).await?.into_message())
}

async fn drive(
    mut events: EventStream,
    mut handler: Option<&mut dyn TokenHandler>,
) -> Result<Interpretation> {
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(handler) = handler.as_deref_mut() {
            handler.on_token(&event).await?;
        }
    }
    events.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatResponse;
    use futures::StreamExt;

    fn feed_all(mode: InterpreterMode, fragments: &[&str]) -> (Vec<Step>, Interpreter) {
        let mut interpreter = Interpreter::new(mode);
        let steps = fragments.iter().map(|f| interpreter.feed(f)).collect();
        (steps, interpreter)
    }

    fn tokens(events: &[TokenEvent]) -> Vec<&str> {
        events.iter().map(|e| e.token.as_str()).collect()
    }

    #[test]
    fn text_mode_passes_everything() {
        let (steps, interpreter) = feed_all(InterpreterMode::Text, &["Hello", ", ", "world", "!"]);
        assert!(steps.iter().all(|s| matches!(s, Step::Emit(_))));
        assert_eq!(interpreter.answer(), "Hello, world!");
        assert_eq!(interpreter.line(), "Hello, world!");
    }

    #[test]
    fn leading_newlines_are_discarded() {
        let (steps, interpreter) = feed_all(InterpreterMode::Text, &["\n", "\n", "Hi", "\n", "there"]);
        assert_eq!(steps[0], Step::Suppressed);
        assert_eq!(steps[1], Step::Suppressed);
        assert!(matches!(steps[2], Step::Emit(_)));
        assert!(matches!(&steps[3], Step::Emit(e) if e.is_new_line));
        assert_eq!(interpreter.answer(), "Hi\nthere");
    }

    #[test]
    fn empty_fragments_are_ignored() {
        let (steps, interpreter) = feed_all(InterpreterMode::Text, &["", "\n", "x"]);
        assert_eq!(steps[0], Step::Suppressed);
        assert_eq!(steps[1], Step::Suppressed);
        assert_eq!(interpreter.answer(), "x");
    }

    #[test]
    fn line_context_tracks_sentences() {
        let (steps, _) = feed_all(InterpreterMode::Text, &["One", " two", ".", " Three"]);
        let Step::Emit(event) = &steps[1] else {
            panic!("expected emit")
        };
        assert_eq!(event.line, "");
        assert_eq!(event.line_lower_case, "one two");

        let Step::Emit(event) = &steps[2] else {
            panic!("expected emit")
        };
        assert_eq!(event.line, "One two.");

        let Step::Emit(event) = &steps[3] else {
            panic!("expected emit")
        };
        assert_eq!(event.line, "One two.");
        assert_eq!(event.line_lower_case, " three");
    }

    #[test]
    fn stop_phrase_ends_the_answer() {
        let (steps, mut interpreter) = feed_all(
            InterpreterMode::Text,
            &["The code", " is Actually", " correct", " as is.", " more"],
        );
        assert_eq!(steps[2], Step::Stop(StopPhrase::ActuallyCorrect));
        assert_eq!(steps[3], Step::Suppressed);
        assert_eq!(steps[4], Step::Suppressed);
        assert!(interpreter.is_finished());
        assert_eq!(
            interpreter.interpretation(),
            Interpretation::Stopped(StopPhrase::ActuallyCorrect)
        );
        assert_eq!(interpreter.feed("later"), Step::Suppressed);
    }

    #[test]
    fn stop_phrase_wins_over_fence_in_same_fragment() {
        let (steps, _) = feed_all(
            InterpreterMode::Code,
            &["intro\n", "I cannot provide that\n```"],
        );
        assert_eq!(steps[1], Step::Stop(StopPhrase::CannotProvide));
    }

    #[test]
    fn stop_phrase_kinds() {
        assert_eq!(StopPhrase::AlreadyCorrect.kind(), StopKind::NothingToChange);
        assert_eq!(StopPhrase::CantProvide.kind(), StopKind::Refusal);
        assert_eq!(
            StopPhrase::find("sorry, i'm unable to provide"),
            Some(StopPhrase::UnableToProvide)
        );
        assert_eq!(StopPhrase::find("all good"), None);
    }

    #[test]
    fn code_mode_extracts_first_block() {
        let (steps, interpreter) = feed_all(
            InterpreterMode::Code,
            &["ignored", "```", "js", "\n", "let x=1;", "\n", "```", "trailing"],
        );
        let emitted: Vec<&str> = steps
            .iter()
            .filter_map(|s| match s {
                Step::Emit(e) => Some(e.token.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(emitted, vec!["let x=1;", "\n"]);
        assert_eq!(steps[6], Step::Finish(None));
        assert_eq!(steps[7], Step::Suppressed);
        assert_eq!(interpreter.answer(), "let x=1;");
        assert_eq!(interpreter.fence_state(), FenceState::Closed);
    }

    #[test]
    fn code_mode_fence_states() {
        let mut interpreter = Interpreter::new(InterpreterMode::Code);
        assert_eq!(interpreter.fence_state(), FenceState::AwaitingFence);
        interpreter.feed("Sure:\n");
        assert_eq!(interpreter.fence_state(), FenceState::AwaitingFence);
        interpreter.feed("```");
        assert_eq!(interpreter.fence_state(), FenceState::SkippingLanguageTag);
        interpreter.feed("rust");
        assert_eq!(interpreter.fence_state(), FenceState::SkippingLanguageTag);
        interpreter.feed("\n");
        assert_eq!(interpreter.fence_state(), FenceState::InsideCode);
        interpreter.feed("```");
        assert_eq!(interpreter.fence_state(), FenceState::Closed);
    }

    #[test]
    fn code_mode_fence_sharing_fragments() {
        let (steps, interpreter) = feed_all(
            InterpreterMode::Code,
            &["Here:\n```python\nprint(1)", "\nprint(2)```", " bye"],
        );
        assert!(matches!(&steps[0], Step::Emit(e) if e.token == "print(1)"));
        assert!(matches!(&steps[1], Step::Finish(Some(e)) if e.token == "\nprint(2)"));
        assert_eq!(interpreter.answer(), "print(1)\nprint(2)");
    }

    #[test]
    fn closing_fence_without_opening_yields_nothing() {
        let (steps, interpreter) = feed_all(InterpreterMode::Code, &["text", "\n", "more"]);
        assert!(steps.iter().all(|s| *s == Step::Suppressed));
        assert_eq!(interpreter.answer(), "");
        assert_eq!(interpreter.fence_state(), FenceState::AwaitingFence);
    }

    #[test]
    fn example_comment_truncates_code() {
        let (steps, interpreter) = feed_all(
            InterpreterMode::Code,
            &[
                "```", "js\n", "function add(a, b) {\n", "  return a + b;\n", "}\n", "\n",
                "// Example", " usage", "\n", "add(1, 2);\n", "```",
            ],
        );
        assert_eq!(steps[8], Step::Finish(None));
        assert_eq!(steps[9], Step::Suppressed);
        assert_eq!(
            interpreter.answer(),
            "function add(a, b) {\n  return a + b;\n}"
        );
    }

    #[test]
    fn example_comment_in_multi_line_fragment_keeps_prefix() {
        let (steps, interpreter) =
            feed_all(InterpreterMode::Code, &["```\n", "x();\n// example:\ny();\n"]);
        assert!(matches!(&steps[1], Step::Finish(Some(e)) if e.token == "x();\n"));
        assert_eq!(interpreter.answer(), "x();");
    }

    #[tokio::test]
    async fn interpret_delivers_only_code() {
        let stream = ChatStream::from_fragments(["ignored", "```", "js", "\n", "let x=1;", "\n", "```"]);
        let token = stream.cancellation_token();
        let mut events: Vec<TokenEvent> = Vec::new();

        let outcome = interpret(stream, InterpreterMode::Code, Some(&mut events), None)
            .await
            .unwrap();

        assert_eq!(outcome, Interpretation::Answer("let x=1;".to_string()));
        assert_eq!(tokens(&events), vec!["let x=1;", "\n"]);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn interpret_stops_and_cancels() {
        let stream = ChatStream::from_fragments([
            "\n", "This", " is", " already", " correct", ".", "\n", "Here", " is", " more",
        ]);
        let token = stream.cancellation_token();
        let mut events: Vec<TokenEvent> = Vec::new();

        let outcome = interpret(stream, InterpreterMode::Text, Some(&mut events), None)
            .await
            .unwrap();

        assert_eq!(outcome, Interpretation::Stopped(StopPhrase::AlreadyCorrect));
        assert_eq!(outcome.clone().into_message(), DEFAULT_MESSAGE);
        assert_eq!(tokens(&events), vec!["This", " is", " already"]);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn interpret_trims_answer() {
        let stream = ChatStream::from_fragments(["\n", "  Hi", " there", "  \n"]);
        let answer = interpret_message(stream, InterpreterMode::Text, None, None)
            .await
            .unwrap();
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let items: Vec<Result<ChatResponse>> = vec![
            Ok(ChatResponse::fragment("partial")),
            Err(Error::streaming("connection reset", None)),
        ];
        let stream = ChatStream::new(stream::iter(items));
        let err = interpret(stream, InterpreterMode::Text, None, None)
            .await
            .unwrap_err();
        assert!(err.is_streaming());
    }

    struct FailingHandler;

    #[async_trait::async_trait]
    impl TokenHandler for FailingHandler {
        async fn on_token(&mut self, _: &TokenEvent) -> Result<()> {
            Err(Error::abort("handler gave up"))
        }
    }

    #[tokio::test]
    async fn handler_error_propagates() {
        let stream = ChatStream::from_fragments(["a", "b"]);
        let mut handler = FailingHandler;
        let err = interpret(stream, InterpreterMode::Text, Some(&mut handler), None)
            .await
            .unwrap_err();
        assert!(err.is_abort());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_delivered_events() {
        let head = stream::iter(vec![Ok(ChatResponse::fragment("slow"))]);
        let stream = ChatStream::new(head.chain(stream::pending::<Result<ChatResponse>>()));
        let token = stream.cancellation_token();
        let mut events: Vec<TokenEvent> = Vec::new();

        let outcome = interpret(
            stream,
            InterpreterMode::Text,
            Some(&mut events),
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Interpretation::TimedOut);
        assert_eq!(outcome.into_message(), DEFAULT_MESSAGE);
        assert_eq!(tokens(&events), vec!["slow"]);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn event_stream_pulls_events() {
        let stream = ChatStream::from_fragments(["a", "b", "```"]);
        let mut events = EventStream::new(stream, InterpreterMode::Text);
        let mut seen = Vec::new();
        while let Some(event) = events.next().await {
            seen.push(event.unwrap().token);
        }
        assert!(events.is_settled());
        assert_eq!(seen, vec!["a", "b", "```"]);
        assert_eq!(
            events.finish().unwrap(),
            Interpretation::Answer("ab```".to_string())
        );
    }

    #[tokio::test]
    async fn event_stream_finish_early_cancels() {
        let stream = ChatStream::from_fragments(["a", "b"]);
        let token = stream.cancellation_token();
        let mut events = EventStream::new(stream, InterpreterMode::Text);
        assert_eq!(events.next().await.unwrap().unwrap().token, "a");
        assert_eq!(
            events.finish().unwrap(),
            Interpretation::Answer("a".to_string())
        );
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn events_as_stream() {
        let stream = ChatStream::from_fragments(["Sure", ":\n", "```rust\n", "fn f() {}", "\n```"]);
        let seen: Vec<String> = events(stream, InterpreterMode::Code)
            .map(|event| event.unwrap().token)
            .collect()
            .await;
        assert_eq!(seen, vec!["fn f() {}", "\n"]);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("CODE".parse::<InterpreterMode>().unwrap(), InterpreterMode::Code);
        assert_eq!(InterpreterMode::Text.to_string(), "text");
        assert!("prose".parse::<InterpreterMode>().is_err());
    }
}
