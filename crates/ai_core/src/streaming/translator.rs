//! Incremental decoding of backend stream frames
//!
//! Bytes arrive in arbitrary chunks; the translator buffers the unterminated
//! remainder in a per-connection [`StreamState`] and decodes each complete
//! line according to the backend's [`WireFormat`].

use serde::Deserialize;
use tracing::{trace, warn};

use crate::error::InferenceError;

/// Native streaming framing of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// One JSON object per line (Ollama-style)
    Ndjson,
    /// `data: <json>` server-sent events (OpenAI-style)
    Sse,
}

/// What one decoded line contributed to the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translated {
    /// A fragment of generated content
    Delta(String),
    /// The backend signalled the end of the response
    Terminal,
    /// The backend reported a failure mid-stream; nothing follows
    Error(String),
}

/// Mutable state of one open stream
#[derive(Debug, Default)]
pub struct StreamState {
    buffer: Vec<u8>,
    content: String,
    pub(super) response_id: Option<String>,
    pub(super) placeholder_requested: bool,
    finished: bool,
}

impl StreamState {
    /// Empty state for a new connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Content accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Persisted record id, once the placeholder has been created
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    /// Whether a terminal signal or an in-stream error has been seen
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes waiting for a line terminator
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug, Deserialize)]
struct NdjsonChunk {
    #[serde(default)]
    message: Option<NdjsonMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NdjsonMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SseChunk {
    #[serde(default)]
    choices: Vec<SseChoice>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SseChoice {
    #[serde(default)]
    delta: Option<SseDelta>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Stateless decoder for one wire format
#[derive(Debug, Clone, Copy)]
pub struct StreamTranslator {
    format: WireFormat,
}

impl StreamTranslator {
    /// Translator for the given wire format
    pub const fn new(format: WireFormat) -> Self {
        Self { format }
    }

    /// Wire format handled by this translator
    pub const fn format(&self) -> WireFormat {
        self.format
    }

    /// Feed one chunk, returning what every completed line contributed
    pub fn push(&self, state: &mut StreamState, chunk: &[u8]) -> Vec<Translated> {
        if state.finished {
            return Vec::new();
        }
        state.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = state.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = state.buffer.drain(..=pos).collect();
            self.process_line(state, &line[..pos], &mut out);
            if state.finished {
                state.buffer.clear();
                break;
            }
        }
        out
    }

    /// Flush a final unterminated line at end of body
    pub fn finish(&self, state: &mut StreamState) -> Vec<Translated> {
        let mut out = Vec::new();
        if !state.finished && !state.buffer.is_empty() {
            let line = std::mem::take(&mut state.buffer);
            self.process_line(state, &line, &mut out);
        }
        state.buffer.clear();
        out
    }

    fn process_line(&self, state: &mut StreamState, raw: &[u8], out: &mut Vec<Translated>) {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches('\r'),
            Err(e) => {
                let err = InferenceError::StreamDecode(format!("invalid UTF-8: {e}"));
                warn!(error = %err, "Skipping stream line");
                return;
            },
        };
        if line.trim().is_empty() {
            return;
        }
        trace!(line = %line, "Decoding stream line");

        let decoded = match self.format {
            WireFormat::Ndjson => decode_ndjson(line),
            WireFormat::Sse => decode_sse(line),
        };

        match decoded {
            Ok(Decoded::Failed(message)) => {
                warn!(error = %message, "Backend reported an error mid-stream");
                state.finished = true;
                out.push(Translated::Error(message));
            },
            Ok(Decoded::Chunk { content, terminal }) => {
                if let Some(content) = content.filter(|c| !c.is_empty()) {
                    state.content.push_str(&content);
                    out.push(Translated::Delta(content));
                }
                if terminal {
                    state.finished = true;
                    out.push(Translated::Terminal);
                }
            },
            Err(err) => {
                warn!(error = %err, "Skipping stream line");
            },
        }
    }
}

enum Decoded {
    Chunk {
        content: Option<String>,
        terminal: bool,
    },
    Failed(String),
}

impl Decoded {
    const fn empty() -> Self {
        Self::Chunk {
            content: None,
            terminal: false,
        }
    }
}

/// Message of an `error` field: a plain string or an object with `message`
fn error_message(error: Option<serde_json::Value>) -> Option<String> {
    match error? {
        serde_json::Value::Null => None,
        serde_json::Value::String(message) => Some(message),
        serde_json::Value::Object(mut fields) => match fields.remove("message") {
            Some(serde_json::Value::String(message)) => Some(message),
            _ => Some(serde_json::Value::Object(fields).to_string()),
        },
        other => Some(other.to_string()),
    }
}

fn decode_ndjson(line: &str) -> Result<Decoded, InferenceError> {
    let chunk: NdjsonChunk =
        serde_json::from_str(line).map_err(|e| InferenceError::StreamDecode(e.to_string()))?;
    if let Some(message) = error_message(chunk.error) {
        return Ok(Decoded::Failed(message));
    }
    Ok(Decoded::Chunk {
        content: chunk.message.map(|m| m.content),
        terminal: chunk.done,
    })
}

fn decode_sse(line: &str) -> Result<Decoded, InferenceError> {
    // Comments, `event:`, `id:` and `retry:` fields carry no content
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(Decoded::empty());
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(Decoded::Chunk {
            content: None,
            terminal: true,
        });
    }

    let chunk: SseChunk =
        serde_json::from_str(payload).map_err(|e| InferenceError::StreamDecode(e.to_string()))?;
    if let Some(message) = error_message(chunk.error) {
        return Ok(Decoded::Failed(message));
    }
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .or(chunk.content);
    Ok(Decoded::Chunk {
        content,
        terminal: chunk.done,
    })
}

/// Rough token count of generated text: one token per four characters
pub fn estimate_tokens(content: &str) -> u64 {
    (content.chars().count() as u64).div_ceil(4)
}
