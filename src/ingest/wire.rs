//! Wire framing: `data: {json}` lines into typed events.
//!
//! The backend writes one JSON object per `data:` line:
//!
//! ```text
//! data: {"chunk": "Hel"}
//! data: {"chart_data": {"type": "bar", "labels": [...], "values": [...]}}
//! data: {"done": true, "conversation_id": 17}
//! data: {"error": "model unavailable"}
//! ```
//!
//! Lines may be split across transport reads at any byte, including in the
//! middle of a UTF-8 sequence. Anything that does not parse is dropped.

use super::transport::ContextId;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Structured side payload, e.g. chart data. Opaque to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPayload(Value);

impl ChartPayload {
    /// Wrap a raw JSON value.
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON value.
    pub const fn value(&self) -> &Value {
        &self.0
    }

    /// Take the raw JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// One classified event from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// Incremental text.
    Delta(String),
    /// Structured side payload.
    Chart(ChartPayload),
    /// End of the response, with the conversation id if one was minted.
    Done(Option<ContextId>),
    /// Server-side failure.
    Error(String),
}

impl WireEvent {
    /// Whether this event ends the stream.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }
}

/// Raw JSON frame. Every key is optional and loosely typed, so one odd
/// value does not cost the frame its other keys.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    chunk: Option<Value>,
    #[serde(default)]
    chart_data: Option<Value>,
    #[serde(default)]
    done: Option<Value>,
    #[serde(default)]
    conversation_id: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl RawFrame {
    /// Events carried by this frame, in delta, chart, done, error order.
    fn into_events(self, events: &mut Vec<WireEvent>) {
        if let Some(chunk) = self.chunk.and_then(text_of) {
            events.push(WireEvent::Delta(chunk));
        }
        if let Some(chart) = self.chart_data.filter(|c| !c.is_null()) {
            events.push(WireEvent::Chart(ChartPayload(chart)));
        }
        if self.done.as_ref().is_some_and(is_truthy) {
            let context = self
                .conversation_id
                .and_then(|id| serde_json::from_value::<ContextId>(id).ok());
            events.push(WireEvent::Done(context));
        }
        if let Some(error) = self.error.filter(is_truthy) {
            events.push(WireEvent::Error(match error {
                Value::String(message) => message,
                other => other.to_string(),
            }));
        }
    }
}

/// Loose boolean reading of a JSON value: null, false, zero and the empty
/// string are false, everything else is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text of a delta: strings as they are, numbers in their JSON form.
fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Incremental line decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of the current, unterminated line.
    pending: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport read and return the events it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        let mut events = Vec::new();
        let mut start = self.pending.len();
        self.pending.extend_from_slice(bytes);

        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            parse_line(&self.pending[..end], &mut events);
            self.pending.drain(..=end);
            start = 0;
        }
        events
    }

    /// Decode whatever is left once the transport has ended.
    pub fn finish(&mut self) -> Vec<WireEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        parse_line(&rest, &mut events);
        events
    }

    /// Whether a partial line is buffered.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn parse_line(line: &[u8], events: &mut Vec<WireEvent>) {
    let Ok(line) = std::str::from_utf8(line) else {
        debug!(len = line.len(), "skipping frame with invalid utf-8");
        return;
    };
    let Some(payload) = line.trim_end_matches('\r').strip_prefix("data:") else {
        return;
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return;
    }

    match serde_json::from_str::<RawFrame>(payload) {
        Ok(frame) => frame.into_events(events),
        Err(err) => debug!(error = %err, "skipping malformed frame"),
    }
}
