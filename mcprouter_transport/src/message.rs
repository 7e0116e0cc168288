//! JSON-RPC 2.0 message model.
//!
//! The bridge relays four kinds of messages. They are told apart by which
//! members are present, the same way the wire format does it:
//!
//! | variant        | `id`        | `method` | `result` | `error` |
//! |----------------|-------------|----------|----------|---------|
//! | `Request`      | yes         | yes      |          |         |
//! | `Response`     | yes         |          | yes      |         |
//! | `Error`        | yes / null  |          |          | yes     |
//! | `Notification` | absent/null | yes      |          |         |
//!
//! Ids are opaque: the bridge never invents one, it only copies the id of an
//! inbound message into the error it synthesizes for it. Top-level members
//! the model does not name are kept in `extra` and written back unchanged.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

use crate::error::{BridgeError, Result};

/// JSON-RPC "internal error" code used for every synthesized proxy failure.
pub const INTERNAL_ERROR: i64 = -32603;

/// Method name of the MCP initialization handshake.
pub const INITIALIZE_METHOD: &str = "initialize";

/// The `"jsonrpc": "2.0"` marker. Serializes to `"2.0"` and rejects anything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(de::Error::custom(format!(
                "unsupported jsonrpc version {version:?}"
            )))
        }
    }
}

/// A request id: any JSON number (integer or not, any magnitude serde_json
/// can hold) or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error reply. The id is `null` when the originating message had none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: ErrorObject,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Request,
    Notification,
    Error,
    Response,
}

/// Any JSON-RPC 2.0 message. Build one with [`JsonRpcMessage::parse`] or
/// [`JsonRpcMessage::from_value`]; serialization writes the variant's fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Parse one framed unit of text.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| BridgeError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value by the members it carries.
    ///
    /// An object with both `method` and a non-null `id` is always a Request;
    /// an id of the wrong type is an error, never a reason to fall back to
    /// Notification.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(BridgeError::Parse(if value.is_array() {
                "batch messages are not supported".to_string()
            } else {
                "expected a JSON object".to_string()
            }));
        };

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            Some(other) => {
                return Err(BridgeError::Parse(format!(
                    "unsupported jsonrpc version {other:?}"
                )));
            }
            None => return Err(BridgeError::Parse("missing jsonrpc version".to_string())),
        }

        let id = object.get("id").filter(|id| !id.is_null());
        if let Some(id) = id
            && !(id.is_number() || id.is_string())
        {
            return Err(BridgeError::Parse(format!(
                "id must be a number or a string, got {id}"
            )));
        }

        let shape = if object.contains_key("method") {
            if id.is_some() {
                Shape::Request
            } else {
                Shape::Notification
            }
        } else if object.contains_key("error") {
            Shape::Error
        } else if object.contains_key("result") {
            if id.is_none() {
                return Err(BridgeError::Parse("response without an id".to_string()));
            }
            Shape::Response
        } else {
            return Err(BridgeError::Parse(
                "message is not a request, response, error or notification".to_string(),
            ));
        };

        let mut value = value;
        match shape {
            Shape::Request => serde_json::from_value(value).map(JsonRpcMessage::Request),
            Shape::Notification => {
                // A null id carries nothing; keep it out of `extra`.
                if let Some(object) = value.as_object_mut() {
                    object.remove("id");
                }
                serde_json::from_value(value).map(JsonRpcMessage::Notification)
            }
            Shape::Error => serde_json::from_value(value).map(JsonRpcMessage::Error),
            Shape::Response => serde_json::from_value(value).map(JsonRpcMessage::Response),
        }
        .map_err(|e| BridgeError::Parse(format!("invalid {shape:?}: {e}")))
    }

    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Request(JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            id,
            method: method.into(),
            params,
            extra: Map::new(),
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Notification(JsonRpcNotification {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            extra: Map::new(),
        })
    }

    /// Build a `-32603` internal error reply.
    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        JsonRpcMessage::Error(JsonRpcErrorResponse {
            jsonrpc: JsonRpcVersion,
            id,
            error: ErrorObject {
                code: INTERNAL_ERROR,
                message: message.into(),
                data: None,
            },
            extra: Map::new(),
        })
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => e.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    /// Only requests oblige the far end to answer.
    pub fn expects_reply(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// Whether this is a response or error answering request `id`.
    pub fn answers(&self, id: &RequestId) -> bool {
        match self {
            JsonRpcMessage::Response(r) => &r.id == id,
            JsonRpcMessage::Error(e) => e.id.as_ref() == Some(id),
            _ => false,
        }
    }

    pub fn is_initialize_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(r) if r.method == INITIALIZE_METHOD)
    }

    /// The error reply written back when relaying this message failed.
    ///
    /// Notifications never receive a reply, so they yield `None`.
    pub fn proxy_error(&self, cause: &BridgeError) -> Option<JsonRpcMessage> {
        if self.is_notification() {
            return None;
        }
        Some(Self::internal_error(
            self.id().cloned(),
            format!("Proxy error: {cause}"),
        ))
    }
}
