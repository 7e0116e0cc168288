//! Newline-delimited framing for the stdio side of the bridge.
//!
//! [`ReadBuffer`] is a pure framing device: bytes go in through
//! [`ReadBuffer::append`] in whatever chunk sizes the input stream produces,
//! and complete messages come out of [`ReadBuffer::read_message`] in arrival
//! order. A trailing partial line stays buffered until its delimiter arrives.

use bytes::BytesMut;

use crate::error::{BridgeError, Result};
use crate::message::JsonRpcMessage;

#[derive(Debug, Default)]
pub struct ReadBuffer {
    buffer: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Dequeue the next complete message.
    ///
    /// Returns `Ok(None)` when no full line is buffered. A line that is not a
    /// JSON-RPC message is consumed and reported as [`BridgeError::Parse`], so
    /// the following call resumes with the next line. Blank lines are skipped.
    pub fn read_message(&mut self) -> Result<Option<JsonRpcMessage>> {
        loop {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let mut line = self.buffer.split_to(newline + 1);
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let text = std::str::from_utf8(&line)
                .map_err(|e| BridgeError::Parse(format!("frame is not valid UTF-8: {e}")))?;
            return JsonRpcMessage::parse(text).map(Some);
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of buffered bytes not yet framed.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Serialize one message as a newline-terminated line.
pub fn serialize_message(message: &JsonRpcMessage) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(line)
}
