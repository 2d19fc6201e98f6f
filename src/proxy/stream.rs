//! Coze-to-OpenAI SSE stream translation.
//!
//! [`LineBuffer`] reassembles SSE lines across TCP chunk boundaries,
//! [`StreamTranslator`] turns each Coze line into zero or more OpenAI
//! `chat.completion.chunk` frames, and [`translate_sse_stream`] drives both
//! over an upstream byte stream, yielding encoded frames lazily.
//!
//! Whatever happens upstream, the output ends with exactly one
//! `data: [DONE]` frame and nothing after it.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::Display;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ChatCompletionChunk, ChunkChoice, Delta, FunctionCallDelta};
use crate::config::DownstreamConfig;

/// Encoded terminal frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Upstream sentinel marking the end of the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Lines longer than this are dropped instead of buffered.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Fixed labels stamped on every emitted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLabels {
    pub id: String,
    pub model: String,
}

impl From<&DownstreamConfig> for ChunkLabels {
    fn from(config: &DownstreamConfig) -> Self {
        Self {
            id: config.id.clone(),
            model: config.model.clone(),
        }
    }
}

/// One downstream SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl Frame {
    /// Encode as `data: <json>\n\n`.
    pub fn to_sse(&self) -> Bytes {
        match self {
            Frame::Chunk(chunk) => match serde_json::to_string(chunk) {
                Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
                Err(e) => {
                    // Chunks hold only strings and integers
                    tracing::error!(error = %e, "Failed to serialize chunk");
                    Bytes::new()
                }
            },
            Frame::Done => Bytes::from_static(DONE_FRAME.as_bytes()),
        }
    }
}

/// Coze event types the translator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpstreamEvent {
    MessageDelta,
    MessageCompleted,
    ChatCompleted,
    Error,
    /// Anything else, including no `event:` line yet.
    Other,
}

impl UpstreamEvent {
    fn classify(name: Option<&str>) -> Self {
        match name {
            Some("conversation.message.delta") => UpstreamEvent::MessageDelta,
            Some("conversation.message.completed") => UpstreamEvent::MessageCompleted,
            Some("conversation.chat.completed") => UpstreamEvent::ChatCompleted,
            Some("error") => UpstreamEvent::Error,
            _ => UpstreamEvent::Other,
        }
    }
}

/// Why a single line was skipped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON in data line: {0}")]
    Json(#[source] serde_json::Error),

    #[error("unexpected payload shape for {event}: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{event} payload is not a JSON object")]
    NotAnObject { event: &'static str },

    #[error("invalid function_call content: {0}")]
    FunctionCall(#[source] serde_json::Error),

    #[error("function_call content is not a JSON object")]
    FunctionCallShape,

    #[error("failed to encode function_call arguments: {0}")]
    Arguments(#[source] io::Error),
}

#[derive(Debug, Deserialize)]
struct MessageDeltaPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageCompletedPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Stateful per-stream line translator.
///
/// Holds the sticky `event:` type; a new translator is created for every
/// upstream response.
#[derive(Debug)]
pub struct StreamTranslator {
    labels: ChunkLabels,
    current_event: Option<String>,
    finished: bool,
}

impl StreamTranslator {
    pub fn new(labels: ChunkLabels) -> Self {
        Self {
            labels,
            current_event: None,
            finished: false,
        }
    }

    /// Whether the terminal frame has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Translate one decoded line.
    ///
    /// Never fails: a line that cannot be translated is logged and yields
    /// nothing. Once `[DONE]` has been emitted every further line is ignored.
    pub fn process_line(&mut self, line: &str) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }

        match self.translate_line(line) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event = ?self.current_event,
                    "Skipping unprocessable upstream line"
                );
                Vec::new()
            }
        }
    }

    /// Close the stream, returning the terminal frame if it is still owed.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.finished {
            None
        } else {
            self.finished = true;
            Some(Frame::Done)
        }
    }

    fn translate_line(&mut self, line: &str) -> Result<Vec<Frame>, FrameError> {
        if line.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(event) = line.strip_prefix("event:") {
            self.current_event = Some(event.trim().to_string());
            return Ok(Vec::new());
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Ok(Vec::new());
        };
        let data = data.trim();

        if data == DONE_SENTINEL {
            self.finished = true;
            return Ok(vec![Frame::Done]);
        }

        let payload: Value = serde_json::from_str(data).map_err(FrameError::Json)?;
        let event = UpstreamEvent::classify(self.current_event.as_deref());
        let mut frames = Vec::new();

        match event {
            UpstreamEvent::MessageCompleted => {
                if let Some(delta) = completed_message_delta(payload)? {
                    frames.push(self.chunk(delta, None));
                }
            }
            UpstreamEvent::MessageDelta => {
                let delta = message_delta(payload)?;
                if !delta.is_empty() {
                    frames.push(self.chunk(delta, None));
                }
            }
            UpstreamEvent::Error => {
                tracing::warn!(payload = %payload, "Upstream reported an error event");
            }
            UpstreamEvent::ChatCompleted | UpstreamEvent::Other => {}
        }

        // Independent of the dispatch above
        if event == UpstreamEvent::ChatCompleted {
            frames.push(self.chunk(Delta::default(), Some("stop")));
        }

        Ok(frames)
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<&str>) -> Frame {
        Frame::Chunk(ChatCompletionChunk {
            id: self.labels.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: self.labels.model.clone(),
            choices: vec![ChunkChoice {
                delta,
                index: 0,
                finish_reason: finish_reason.map(str::to_string),
            }],
        })
    }
}

/// Build the delta for a `conversation.message.delta` payload.
fn message_delta(payload: Value) -> Result<Delta, FrameError> {
    const EVENT: &str = "conversation.message.delta";
    if !payload.is_object() {
        return Err(FrameError::NotAnObject { event: EVENT });
    }
    let payload: MessageDeltaPayload =
        serde_json::from_value(payload).map_err(|source| FrameError::Payload {
            event: EVENT,
            source,
        })?;

    Ok(Delta {
        content: payload.content.filter(|c| !c.is_empty()),
        reasoning_content: payload.reasoning_content.filter(|c| !c.is_empty()),
        ..Default::default()
    })
}

/// Build the delta for a `conversation.message.completed` payload, if its
/// message type is one that is forwarded.
fn completed_message_delta(payload: Value) -> Result<Option<Delta>, FrameError> {
    const EVENT: &str = "conversation.message.completed";
    if !payload.is_object() {
        return Err(FrameError::NotAnObject { event: EVENT });
    }
    let payload: MessageCompletedPayload =
        serde_json::from_value(payload).map_err(|source| FrameError::Payload {
            event: EVENT,
            source,
        })?;

    match payload.kind.as_deref() {
        Some("function_call") => {
            let content = payload.content.as_deref().unwrap_or("{}");
            let function_call = function_call_delta(content)?;
            Ok(Some(Delta {
                function_call: Some(function_call),
                ..Default::default()
            }))
        }
        Some("tool_response") => Ok(Some(Delta {
            tool_response: Some(payload.content.unwrap_or_default()),
            ..Default::default()
        })),
        // Answers arrive as deltas; other message types are not forwarded
        _ => Ok(None),
    }
}

/// Parse a Coze function call and re-encode its arguments as a JSON string.
fn function_call_delta(content: &str) -> Result<FunctionCallDelta, FrameError> {
    let value: Value = serde_json::from_str(content).map_err(FrameError::FunctionCall)?;
    let call = value.as_object().ok_or(FrameError::FunctionCallShape)?;

    let name = call
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let empty = Value::Object(serde_json::Map::new());
    let arguments = encode_arguments(call.get("arguments").unwrap_or(&empty))?;

    Ok(FunctionCallDelta { name, arguments })
}

/// Encode function arguments with `", "` and `": "` separators.
///
/// Produces `{"x": 1}` rather than `{"x":1}`. Key order is preserved.
pub fn encode_arguments(arguments: &Value) -> Result<String, FrameError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    arguments
        .serialize(&mut ser)
        .map_err(|e| FrameError::Arguments(io::Error::other(e)))?;
    String::from_utf8(buf).map_err(|e| FrameError::Arguments(io::Error::other(e)))
}

/// Compact JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Byte buffer that splits an SSE body into lines.
///
/// Handles `\n`, `\r\n` and bare `\r` endings, including a `\r\n` pair or a
/// line split across chunk boundaries.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    /// Set while discarding the tail of an oversized line.
    overflowed: bool,
    /// The last byte seen was a `\r` terminator.
    after_cr: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            let terminator = rest[pos];
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            // Second half of a `\r\n` pair
            if terminator == b'\n' && self.after_cr && head.is_empty() {
                self.after_cr = false;
                continue;
            }
            self.after_cr = terminator == b'\r';

            if self.overflowed {
                self.overflowed = false;
                continue;
            }
            self.buffer.extend_from_slice(head);
            let raw = std::mem::take(&mut self.buffer);
            if let Some(line) = decode_line(raw) {
                lines.push(line);
            }
        }

        if !rest.is_empty() {
            self.after_cr = false;
        }

        if !self.overflowed {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() > MAX_LINE_BYTES {
                tracing::warn!(
                    buffered = self.buffer.len(),
                    limit = MAX_LINE_BYTES,
                    "Discarding oversized upstream line"
                );
                self.buffer.clear();
                self.overflowed = true;
            }
        }

        lines
    }

    /// Return the trailing line left without a newline, if any.
    pub fn flush(&mut self) -> Option<String> {
        let overflowed = std::mem::take(&mut self.overflowed);
        let raw = std::mem::take(&mut self.buffer);
        if overflowed || raw.is_empty() {
            return None;
        }
        decode_line(raw)
    }
}

fn decode_line(raw: Vec<u8>) -> Option<String> {
    match String::from_utf8(raw) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping upstream line with invalid UTF-8");
            None
        }
    }
}

/// Pull state for [`translate_sse_stream`].
struct TranslationState<S> {
    upstream: Pin<Box<S>>,
    lines: LineBuffer,
    translator: StreamTranslator,
    pending: VecDeque<Frame>,
}

impl<S> TranslationState<S> {
    /// Feed complete lines, stopping at the terminal frame.
    fn feed(&mut self, lines: impl IntoIterator<Item = String>) {
        for line in lines {
            self.pending.extend(self.translator.process_line(&line));
            if self.translator.is_finished() {
                break;
            }
        }
    }

    /// Upstream is exhausted: flush the partial line and owe `[DONE]`.
    fn close(&mut self) {
        if let Some(line) = self.lines.flush() {
            self.feed(Some(line));
        }
        self.pending.extend(self.translator.finish());
    }
}

/// Translate a Coze SSE body into an OpenAI SSE body.
///
/// The returned stream is lazy: each poll reads upstream only as far as
/// needed to produce the next frame. Once `[DONE]` is yielded the upstream
/// stream is dropped without reading further. An upstream transport error
/// ends the stream as if the body had closed, so the terminal frame is
/// still delivered.
pub fn translate_sse_stream<S, E>(
    upstream: S,
    labels: ChunkLabels,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Display + Send,
{
    let state = TranslationState {
        upstream: Box::pin(upstream),
        lines: LineBuffer::new(),
        translator: StreamTranslator::new(labels),
        pending: VecDeque::new(),
    };

    futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(frame) = state.pending.pop_front() {
                let next = if frame == Frame::Done { None } else { Some(state) };
                return Some((Ok::<Bytes, Infallible>(frame.to_sse()), next));
            }

            if state.translator.is_finished() {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(bytes)) => {
                    let lines = state.lines.push(&bytes);
                    state.feed(lines);
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Error streaming from upstream");
                    state.close();
                }
                None => {
                    tracing::debug!("Upstream stream closed");
                    state.close();
                }
            }
        }
    })
}
