//! Session continuity for the remote endpoint.
//!
//! The remote issues an opaque id in the `Mcp-Session-Id` response header.
//! Once held, it is echoed on every later request except `initialize`, which
//! always starts a fresh session.

use tracing::{debug, info};

use crate::message::JsonRpcMessage;

/// MCP Session-Id header name (Streamable HTTP transport, 2025-03-26)
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Debug, Default, Clone)]
pub struct SessionToken {
    current: Option<String>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }

    /// The value to attach to an outbound request carrying `message`, if any.
    pub fn header_for(&self, message: &JsonRpcMessage) -> Option<&str> {
        if message.is_initialize_request() {
            return None;
        }
        self.get()
    }

    /// Take over a session id announced by the remote. Empty values are ignored.
    pub fn adopt(&mut self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        if self.current.as_deref() != Some(session_id) {
            info!(session_id = %session_id, previous = ?self.current, "Adopted remote session");
            self.current = Some(session_id.to_string());
        }
    }

    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            debug!("Session ID cleared");
        }
    }
}
