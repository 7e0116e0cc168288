//! Decoding of `text/event-stream` reply bodies.
//!
//! Streamable-HTTP MCP endpoints may answer a POST with a short SSE stream
//! instead of a plain JSON body. Each `data:` payload of such a stream is one
//! JSON-RPC message; `event:`, `id:` and `retry:` fields carry nothing the
//! bridge needs.

use crate::error::{BridgeError, Result};
use crate::message::JsonRpcMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseEventParser {
    event_type: Option<String>,
    data: String,
    has_data: bool,
}

impl SseEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns an event when a blank line terminates one.
    pub fn feed_line(&mut self, raw_line: &str) -> Option<SseEvent> {
        let line = raw_line.trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event_type = (!value.is_empty()).then(|| value.to_string());
            }
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            _ => {}
        }
        None
    }

    /// Flush a trailing event whose terminating blank line never arrived.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event_type.is_none() && !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event_type: self.event_type.take(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Extract every JSON-RPC message carried by an SSE body, in stream order.
pub fn decode_event_stream(body: &str) -> Result<Vec<JsonRpcMessage>> {
    let mut parser = SseEventParser::new();
    let mut events: Vec<SseEvent> = body.lines().filter_map(|l| parser.feed_line(l)).collect();
    events.extend(parser.finish());

    events
        .into_iter()
        .filter(|event| !event.data.trim().is_empty())
        .map(|event| {
            JsonRpcMessage::parse(&event.data).map_err(|e| {
                BridgeError::InvalidReply(format!("event stream carried a bad message: {e}"))
            })
        })
        .collect()
}
