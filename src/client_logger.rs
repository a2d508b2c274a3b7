//! Logging trait for Ollama client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all interactions passing through the [`Ollama`](crate::Ollama) client,
//! and a [`JsonLinesLogger`] that appends them to a file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::json;

use crate::error::{Error, Result};
use crate::types::{ChatRequest, ChatResponse};

/// A trait for logging client operations.
///
/// Implement this trait to capture and record all chat requests and the individual
/// streamed lines that answer them.
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing chat request.
    ///
    /// This method is called once per `chat` call, before the request is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log an individual streaming event.
    ///
    /// This method is called for each [`ChatResponse`] line received during a
    /// streaming request, including the final line with `done` set.
    fn log_stream_event(&self, event: &ChatResponse);

    /// Log a transport or decoding failure.
    fn log_error(&self, error: &Error);
}

/// A [`ClientLogger`] that writes one JSON object per line.
pub struct JsonLinesLogger {
    file: Mutex<File>,
}

impl JsonLinesLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| Error::io("failed to open log file", err))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write(&self, value: serde_json::Value) {
        // Logging never fails the request it observes.
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{value}");
        }
    }
}

impl ClientLogger for JsonLinesLogger {
    fn log_request(&self, request: &ChatRequest) {
        self.write(json!({ "request": request }));
    }

    fn log_stream_event(&self, event: &ChatResponse) {
        self.write(json!({ "event": event }));
    }

    fn log_error(&self, error: &Error) {
        self.write(json!({ "error": error.to_string() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_call() {
        let path = std::env::temp_dir().join(format!(
            "goblln-logger-{}-{}.jsonl",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        let logger = JsonLinesLogger::create(&path).unwrap();
        logger.log_request(&ChatRequest::single_turn("gemma2", "hi"));
        logger.log_stream_event(&ChatResponse::fragment("Hello"));
        logger.log_error(&Error::abort("stopped"));
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["request"]["model"], "gemma2");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"]["message"]["content"], "Hello");
        assert!(lines[2].contains("stopped"));

        let _ = std::fs::remove_file(&path);
    }
}
