//! Output rendering for streamed answers.
//!
//! Both renderers implement [`TokenHandler`], so they can be handed straight to the
//! interpreter or to any [`Goblln`](crate::Goblln) task.

use std::io::{self, Stdout, Write};

use crate::error::{Error, Result};
use crate::interpreter::{StopPhrase, TokenEvent, TokenHandler};

/// ANSI escape code for dim text (used for informational messages).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for interruptions).
const ANSI_YELLOW: &str = "\x1b[33m";

fn write_error(err: io::Error) -> Error {
    Error::io("failed to write output", err)
}

/// Writes every token as it arrives.
///
/// Output is flushed after each token so the answer appears as it is generated.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    line_start: bool,
    tokens_written: usize,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Render to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
            tokens_written: 0,
        }
    }

    /// Returns true when ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// The number of tokens written so far.
    pub fn tokens_written(&self) -> usize {
        self.tokens_written
    }

    /// Print an error message on its own line.
    pub fn print_error(&mut self, error: &str) -> Result<()> {
        let message = if self.use_color {
            format!("Error: {ANSI_RED}{error}{ANSI_RESET}")
        } else {
            format!("Error: {error}")
        };
        self.print_line(&message)
    }

    /// Print an informational message on its own line.
    pub fn print_info(&mut self, info: &str) -> Result<()> {
        let message = if self.use_color {
            format!("{ANSI_DIM}{info}{ANSI_RESET}")
        } else {
            info.to_string()
        };
        self.print_line(&message)
    }

    /// Note that the answer was cut short.
    pub fn print_interrupted(&mut self) -> Result<()> {
        let message = if self.use_color {
            format!("{ANSI_YELLOW}[interrupted]{ANSI_RESET}")
        } else {
            "[interrupted]".to_string()
        };
        self.print_line(&message)
    }

    /// End the answer with a newline unless it already ended with one.
    pub fn finish_response(&mut self) -> Result<()> {
        if !self.line_start {
            self.write("\n")?;
        }
        Ok(())
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        self.finish_response()?;
        self.write(line)?;
        self.write("\n")
    }

    fn write(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.out.write_all(text.as_bytes()).map_err(write_error)?;
        self.out.flush().map_err(write_error)?;
        self.line_start = text.ends_with('\n');
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> TokenHandler for PlainTextRenderer<W> {
    async fn on_token(&mut self, event: &TokenEvent) -> Result<()> {
        self.tokens_written += 1;
        self.write(&event.token)
    }
}

/// Writes whole lines once they complete.
///
/// Lines that carry a stop phrase are left out, so a "nothing to fix" verdict never reaches
/// the terminal.
pub struct LineRenderer<W: Write + Send = Stdout> {
    out: W,
    current: String,
    lines_written: usize,
}

impl LineRenderer {
    /// Render lines to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for LineRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> LineRenderer<W> {
    /// Render lines to `out`.
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            current: String::new(),
            lines_written: 0,
        }
    }

    /// The number of lines written so far.
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Write the unterminated last line, if any.
    pub fn finish(&mut self) -> Result<()> {
        let rest = std::mem::take(&mut self.current);
        if rest.trim().is_empty() {
            return Ok(());
        }
        self.print_line(rest.trim_end())
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        if StopPhrase::find(&line.to_lowercase()).is_some() {
            return Ok(());
        }
        writeln!(self.out, "{line}").map_err(write_error)?;
        self.out.flush().map_err(write_error)?;
        self.lines_written += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> TokenHandler for LineRenderer<W> {
    async fn on_token(&mut self, event: &TokenEvent) -> Result<()> {
        self.current.push_str(&event.token);
        while let Some(idx) = self.current.find('\n') {
            let line: String = self.current.drain(..=idx).collect();
            self.print_line(line.trim_end())?;
        }
        Ok(())
    }
}
