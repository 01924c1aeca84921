//! Server-Sent Events processing for `streamGenerateContent?alt=sse`.
//!
//! Gemini frames every chunk as a bare `data: {json}` event terminated by a
//! blank line (`\r\n\r\n` in practice). This module turns the raw byte stream
//! into a stream of [`GenerateContentResponse`] chunks.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::client::{GoogleErrorEnvelope, error_for_status};
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::types::GenerateContentResponse;
use crate::{Error, Result};

/// Process a stream of bytes into a stream of response chunks.
///
/// Events may be split across network chunks, and multi-byte characters may
/// straddle a chunk boundary; bytes are only decoded once a whole event has
/// arrived.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer = EventBuffer::default();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                // Drain every complete event already buffered.
                while let Some(event) = buffer.next_event() {
                    match parse_event(&event) {
                        Ok(None) => continue,
                        Ok(Some(chunk)) => {
                            STREAM_EVENTS.click();
                            return Some((Ok(chunk), (stream, buffer, false)));
                        }
                        Err(err) => {
                            STREAM_ERRORS.click();
                            return Some((Err(err), (stream, buffer, false)));
                        }
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.push(&bytes);
                    }
                    Some(Err(err)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        // A final event without its trailing blank line.
                        let rest = buffer.take_rest();
                        return match parse_event(&rest) {
                            Ok(None) => None,
                            Ok(Some(chunk)) => {
                                STREAM_EVENTS.click();
                                Some((Ok(chunk), (stream, buffer, true)))
                            }
                            Err(err) => {
                                STREAM_ERRORS.click();
                                Some((Err(err), (stream, buffer, true)))
                            }
                        };
                    }
                }
            }
        },
    )
}

/// Bytes received but not yet split into events.
#[derive(Debug, Default)]
struct EventBuffer {
    bytes: Vec<u8>,
    /// Prefix already searched without finding a blank line.
    scanned: usize,
}

impl EventBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Split the first complete event off the front of the buffer.
    fn next_event(&mut self) -> Option<Vec<u8>> {
        let Some((end, rest)) = find_boundary(&self.bytes, self.scanned) else {
            // A boundary may straddle the next chunk: keep its first three bytes.
            self.scanned = self.bytes.len().saturating_sub(3);
            return None;
        };
        let event = self.bytes[..end].to_vec();
        self.bytes.drain(..rest);
        self.scanned = 0;
        Some(event)
    }

    fn take_rest(&mut self) -> Vec<u8> {
        self.scanned = 0;
        std::mem::take(&mut self.bytes)
    }
}

/// Position of the first blank line at or after `from`:
/// `(end of event, start of the rest)`.
fn find_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buffer.len()).find_map(|i| {
        if buffer[i..].starts_with(b"\r\n\r\n") {
            Some((i, i + 4))
        } else if buffer[i..].starts_with(b"\n\n") {
            Some((i, i + 2))
        } else {
            None
        }
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamPayload {
    Error(GoogleErrorEnvelope),
    Chunk(GenerateContentResponse),
}

/// Parse one event. `Ok(None)` means the event carried no data (comments,
/// keep-alives, or a `[DONE]` marker from a proxy).
fn parse_event(event: &[u8]) -> Result<Option<GenerateContentResponse>> {
    let text = std::str::from_utf8(event)
        .map_err(|e| Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e))))?;

    let data = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>()
        .join("\n");

    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    match serde_json::from_str::<StreamPayload>(data) {
        Ok(StreamPayload::Chunk(chunk)) => Ok(Some(chunk)),
        Ok(StreamPayload::Error(envelope)) => {
            let code = envelope.error.code.unwrap_or(500);
            Err(error_for_status(code, None, envelope.error))
        }
        Err(e) => Err(Error::serialization(
            format!("Failed to parse stream event: {e}"),
            Some(Box::new(e)),
        )),
    }
}
