//! Decoding of the OpenAI-style `text/event-stream` completion body.
//!
//! The body is split into lines, only `data: ` lines matter, and each data
//! payload is a JSON chunk whose first choice may carry a `delta.content`
//! fragment. A payload that fails to parse is skipped rather than failing the
//! whole reply.

use crate::constants::sse::{DATA_PREFIX, DONE_MARKER};
use crate::error::RelayError;
use crate::llm::FragmentStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// What one line of the upstream body means for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Fragment(String),
    Done,
    Skip,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

pub fn decode_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };

    if data.trim() == DONE_MARKER {
        return SseLine::Done;
    }

    let chunk: CompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("discarding malformed upstream chunk: {}", e);
            return SseLine::Skip;
        }
    };

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(content) if !content.is_empty() => SseLine::Fragment(content),
        _ => SseLine::Skip,
    }
}

/// Accumulates raw body bytes and hands back complete lines.
///
/// Splitting happens on bytes so a multi-byte character cut across two network
/// chunks is reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Whatever trailed the last newline when the body ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    lines: LineBuffer,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match decode_line(line) {
            SseLine::Fragment(fragment) => self.ready.push_back(fragment),
            SseLine::Done => self.finished = true,
            SseLine::Skip => {}
        }
    }
}

/// Turn a raw completion body into a fragment stream.
///
/// The body is only polled when the consumer asks for the next fragment, so a
/// slow consumer stalls the socket read instead of growing a buffer. A body
/// error becomes a single `UpstreamInterrupted` item that ends the stream.
pub fn decode_body<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        lines: LineBuffer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.ready.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    for line in st.lines.push(chunk.as_ref()) {
                        st.absorb(&line);
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(RelayError::UpstreamInterrupted(e.to_string())), st));
                }
                None => {
                    if let Some(rest) = st.lines.finish() {
                        st.absorb(&rest);
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(decode_line(line), SseLine::Fragment("Hel".to_string()));
    }

    #[test]
    fn test_decode_done_marker() {
        assert_eq!(decode_line("data: [DONE]"), SseLine::Done);
        assert_eq!(decode_line("data: [DONE]\r"), SseLine::Done);
    }

    #[test]
    fn test_decode_skips_non_data_and_empty_lines() {
        assert_eq!(decode_line(""), SseLine::Skip);
        assert_eq!(decode_line(": keep-alive"), SseLine::Skip);
        assert_eq!(decode_line("event: message"), SseLine::Skip);
    }

    #[test]
    fn test_decode_skips_malformed_json() {
        assert_eq!(decode_line("data: {not json"), SseLine::Skip);
    }

    #[test]
    fn test_decode_skips_role_only_and_empty_deltas() {
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        let empty = r#"data: {"choices":[{"delta":{"content":""}}]}"#;
        let null = r#"data: {"choices":[{"delta":{"content":null}}]}"#;
        let no_choices = r#"data: {"choices":[],"usage":{"prompt_tokens":3}}"#;
        assert_eq!(decode_line(role_only), SseLine::Skip);
        assert_eq!(decode_line(empty), SseLine::Skip);
        assert_eq!(decode_line(null), SseLine::Skip);
        assert_eq!(decode_line(no_choices), SseLine::Skip);
    }

    #[test]
    fn test_line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\n\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: [DONE]"]);
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_line_buffer_reassembles_multibyte_characters() {
        let bytes = "data: héllo\n".as_bytes();
        let mut buf = LineBuffer::new();
        // Cut inside the two-byte 'é'.
        assert!(buf.push(&bytes[..8]).is_empty());
        let lines = buf.push(&bytes[8..]);
        assert_eq!(lines, vec!["data: héllo"]);
    }

    #[test]
    fn test_line_buffer_finish_returns_trailing_partial_line() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: [DONE]");
        assert_eq!(buf.finish().as_deref(), Some("data: [DONE]"));
        assert!(buf.finish().is_none());
    }
}
