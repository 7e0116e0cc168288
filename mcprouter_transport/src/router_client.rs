//! Client for the router management API (`list-tools`, `call-tool`).
//!
//! Unlike the MCP endpoint, this API authenticates with a bearer token and
//! wraps every result in a `{code, message, data}` envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::DEFAULT_ROUTER_API_URL;
use crate::error::{BridgeError, Result};

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct CallToolBody<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Clone)]
pub struct RouterClient {
    http: reqwest::Client,
    api_base: Url,
    server_key: String,
}

impl RouterClient {
    pub fn new(server_key: impl Into<String>) -> Result<Self> {
        Self::with_api_base(server_key, DEFAULT_ROUTER_API_URL)
    }

    pub fn with_api_base(server_key: impl Into<String>, api_base: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_base: Url::parse(api_base)?,
            server_key: server_key.into(),
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub async fn list_tools(&self) -> Result<Value> {
        self.request("list-tools", None).await
    }

    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let body = serde_json::to_value(CallToolBody { name, arguments })?;
        self.request("call-tool", Some(&body)).await
    }

    /// POST to `{api_base}/{endpoint}` and unwrap the envelope's `data`.
    pub async fn request(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        debug!(url = %url, "Calling router API");

        let mut request = self.http.post(url).bearer_auth(&self.server_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BridgeError::InvalidReply(e.to_string()))?;
        if envelope.code != 0 {
            return Err(BridgeError::Router(envelope.message));
        }
        Ok(envelope.data)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidProxyUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .push(endpoint);
        Ok(url)
    }
}
