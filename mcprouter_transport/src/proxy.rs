//! HTTP side of the bridge: one JSON-RPC message in, one POST out.

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::{BridgeError, Result};
use crate::message::JsonRpcMessage;
use crate::session::{MCP_SESSION_ID_HEADER, SessionToken};
use crate::sse::decode_event_stream;

/// Unique per-call id, for correlating bridge logs with remote logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fixed client identity header.
pub const REQUEST_FROM_HEADER: &str = "x-request-from";

const EVENT_STREAM: &str = "text/event-stream";

/// What the remote answered to one forwarded message.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReply {
    /// Messages to write back, in order. Empty for accepted notifications.
    pub messages: Vec<JsonRpcMessage>,
    /// Session id announced by this response, if any.
    pub session_id: Option<String>,
    /// The `X-Request-ID` sent with this call.
    pub request_id: String,
}

/// Owns the HTTP client, the remote configuration and the session token.
#[derive(Debug)]
pub struct ProxyClient {
    http: reqwest::Client,
    config: ProxyConfig,
    session: SessionToken,
}

impl ProxyClient {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config,
            session: SessionToken::new(),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn configure(&mut self, proxy_url: &str, server_key: &str, request_timeout: Duration) {
        self.config.configure(proxy_url, server_key, request_timeout);
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    pub fn clear_session(&mut self) {
        self.session.clear();
    }

    /// POST `message` to `{proxy_url}/{server_key}` and decode the reply.
    ///
    /// The whole exchange, body included, is bounded by the configured
    /// timeout. A session id on a successful response is adopted before the
    /// body is decoded, so it survives a malformed body. A request whose reply
    /// holds no response or error carrying its id fails with `MissingReply`.
    pub async fn forward(&mut self, message: &JsonRpcMessage) -> Result<RemoteReply> {
        let url = self.config.target_url()?;
        let request_id = Uuid::new_v4().to_string();
        let body = serde_json::to_vec(message)?;

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .header(REQUEST_FROM_HEADER, self.config.client_name.as_str())
            .body(body);
        if self.config.sends_bearer() {
            request = request.bearer_auth(&self.config.server_key);
        }
        let session_header = self.session.header_for(message);
        if let Some(session_id) = session_header {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        debug!(
            proxy_url = %self.config.proxy_url,
            request_id = %request_id,
            method = ?message.method(),
            id = ?message.id(),
            session_id = ?session_header,
            "Sending message to proxy"
        );

        let timeout = self.config.request_timeout;
        let exchange = async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BridgeError::HttpStatus {
                    status: status.as_u16(),
                });
            }
            let session_id = response
                .headers()
                .get(MCP_SESSION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let is_event_stream = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with(EVENT_STREAM));
            let body = response.bytes().await?;
            Ok::<_, BridgeError>((session_id, is_event_stream, body))
        };

        let (session_id, is_event_stream, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| BridgeError::Timeout(timeout))??;

        if let Some(id) = session_id.as_deref() {
            self.session.adopt(id);
        }

        let messages = decode_body(&body, is_event_stream)?;
        if let JsonRpcMessage::Request(request) = message
            && !messages.iter().any(|reply| reply.answers(&request.id))
        {
            return Err(BridgeError::MissingReply(request.id.clone()));
        }

        debug!(
            request_id = %request_id,
            replies = messages.len(),
            session_id = ?session_id,
            "Received reply from proxy"
        );

        Ok(RemoteReply {
            messages,
            session_id,
            request_id,
        })
    }
}

fn decode_body(body: &Bytes, is_event_stream: bool) -> Result<Vec<JsonRpcMessage>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    if is_event_stream {
        let text = std::str::from_utf8(body)
            .map_err(|e| BridgeError::InvalidReply(format!("event stream is not UTF-8: {e}")))?;
        return decode_event_stream(text);
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| BridgeError::InvalidReply(format!("body is not JSON: {e}")))?;
    let message =
        JsonRpcMessage::from_value(value).map_err(|e| BridgeError::InvalidReply(e.to_string()))?;
    Ok(vec![message])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_decodes_to_nothing() {
        assert!(decode_body(&Bytes::new(), false).unwrap().is_empty());
        assert!(decode_body(&Bytes::from_static(b" \n"), true).unwrap().is_empty());
    }

    #[test]
    fn json_body_decodes_to_one_message() {
        let body = Bytes::from_static(br#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
        let messages = decode_body(&body, false).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn non_jsonrpc_body_is_invalid_reply() {
        let err = decode_body(&Bytes::from_static(b"<html>"), false).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidReply(_)));

        let err = decode_body(&Bytes::from_static(br#"{"ok":true}"#), false).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidReply(_)));
    }

    #[test]
    fn event_stream_body_uses_sse_decoding() {
        let body = Bytes::from_static(
            b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":9,\"result\":[]}\n\n",
        );
        let messages = decode_body(&body, true).unwrap();
        assert_eq!(messages.len(), 1);
    }
}
