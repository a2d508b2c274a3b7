//! Newline-delimited JSON processing for streaming responses.
//!
//! The Ollama chat endpoint answers a streaming request with one JSON object per line.
//! This module converts the raw byte stream of such a response into a stream of
//! [`ChatResponse`] values, handling buffering across chunk boundaries and error lines.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::{ChatResponse, Error, Result};

/// Process a stream of bytes into a stream of chat responses.
///
/// Lines may be split across chunks arbitrarily, including in the middle of a multi-byte
/// UTF-8 sequence.  Blank lines are skipped.  A trailing line without a newline is parsed
/// when the byte stream ends.
pub fn process_ndjson<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    // Convert transport errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First check if we have a complete line in the buffer
                if let Some((line, remaining)) = extract_line(&buffer) {
                    buffer = remaining;
                    match line {
                        Some(line) => return Some((parse_line(&line), (stream, buffer, false))),
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, false)));
                    }
                    None => {
                        // End of stream
                        let rest = std::mem::take(&mut buffer);
                        if rest.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        return Some((parse_line(&rest), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Split the first line off `buffer`.
///
/// Returns `None` when no newline is buffered yet, `Some((None, rest))` for a blank line and
/// `Some((Some(line), rest))` otherwise.
#[allow(clippy::type_complexity)]
fn extract_line(buffer: &[u8]) -> Option<(Option<Vec<u8>>, Vec<u8>)> {
    let newline = buffer.iter().position(|b| *b == b'\n')?;
    let line = &buffer[..newline];
    let rest = buffer[newline + 1..].to_vec();
    if line.iter().all(u8::is_ascii_whitespace) {
        Some((None, rest))
    } else {
        Some((Some(line.to_vec()), rest))
    }
}

/// Parse one line of the response body.
fn parse_line(line: &[u8]) -> Result<ChatResponse> {
    #[derive(Deserialize)]
    struct ErrorLine {
        error: String,
    }

    let text = std::str::from_utf8(line).map_err(|e| {
        STREAM_ERRORS.click();
        Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
    })?;
    let text = text.trim();

    if let Ok(error_line) = serde_json::from_str::<ErrorLine>(text) {
        STREAM_ERRORS.click();
        return Err(Error::api(500, error_line.error));
    }

    serde_json::from_str::<ChatResponse>(text).map_err(|e| {
        STREAM_ERRORS.click();
        Error::serialization(
            format!("Failed to parse stream line '{text}': {e}"),
            Some(Box::new(e)),
        )
    })
}
