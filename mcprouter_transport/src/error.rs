//! Error types for the stdio-to-HTTP bridge

use std::time::Duration;
use thiserror::Error;

use crate::message::RequestId;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("invalid JSON-RPC frame: {0}")]
    Parse(String),

    #[error("Proxy request failed with status {status}")]
    HttpStatus { status: u16 },

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("malformed reply from remote: {0}")]
    InvalidReply(String),

    #[error("remote returned no reply for request {0}")]
    MissingReply(RequestId),

    #[error("failed to write to output stream: {0}")]
    Write(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("invalid proxy URL: {0}")]
    InvalidProxyUrl(String),

    #[error("router request failed: {0}")]
    Router(String),

    #[error("bridge is closed")]
    BridgeClosed,
}

/// Coarse classification published on the bridge's error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A framed unit from the input stream was not a JSON-RPC message.
    Parse,
    /// The remote call failed: network error, bad status, bad or missing reply.
    Transport,
    /// The remote call exceeded the configured round-trip timeout.
    Timeout,
    /// The output stream (or input stream) could not be used.
    Write,
}

impl BridgeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BridgeError::Parse(_) => FailureKind::Parse,
            BridgeError::Timeout(_) => FailureKind::Timeout,
            BridgeError::HttpRequest(e) if e.is_timeout() => FailureKind::Timeout,
            BridgeError::Write(_) | BridgeError::Io(_) | BridgeError::BridgeClosed => {
                FailureKind::Write
            }
            _ => FailureKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
