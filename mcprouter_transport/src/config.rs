//! Bridge configuration.
//!
//! Values come from three places, highest precedence first: explicit setters
//! (the CLI), environment variables, and the defaults below.

use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::{BridgeError, Result};

/// Default remote MCP endpoint; the access key is appended as a path segment.
pub const DEFAULT_PROXY_URL: &str = "https://router.mcp.so/mcp";

/// Default base URL of the router management API.
pub const DEFAULT_ROUTER_API_URL: &str = "https://router.mcp.so/v1";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Value of the `X-Request-From` header identifying this client to the router.
pub const DEFAULT_CLIENT_NAME: &str = "mcp-server-router";

pub const SERVER_KEY_ENV: &str = "SERVER_KEY";
pub const PROXY_URL_ENV: &str = "PROXY_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "MCPROUTER_REQUEST_TIMEOUT_MS";

/// Get the round-trip timeout in milliseconds from MCPROUTER_REQUEST_TIMEOUT_MS.
/// Defaults to 30000 if not set or invalid.
pub fn request_timeout_ms() -> u64 {
    std::env::var(REQUEST_TIMEOUT_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
}

/// How the access key is presented to the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Key only as the last path segment of the endpoint URL.
    #[default]
    PathOnly,
    /// Key in the path and additionally as `Authorization: Bearer <key>`.
    PathAndBearer,
}

/// Remote target, credential and per-call timeout of a bridge.
///
/// # Example
///
/// ```rust
/// use mcprouter_transport::ProxyConfig;
/// use std::time::Duration;
///
/// let mut config = ProxyConfig::default();
/// config.configure("http://127.0.0.1:8080/mcp", "my-key", Duration::from_secs(5));
/// assert_eq!(
///     config.target_url().unwrap().as_str(),
///     "http://127.0.0.1:8080/mcp/my-key"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub proxy_url: String,
    pub server_key: String,
    pub request_timeout: Duration,
    pub auth: AuthMode,
    pub client_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            server_key: String::new(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            auth: AuthMode::default(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Defaults overridden by `SERVER_KEY`, `PROXY_URL` and
    /// `MCPROUTER_REQUEST_TIMEOUT_MS` when they are set.
    pub fn from_env() -> Self {
        let mut config = Self {
            request_timeout: Duration::from_millis(request_timeout_ms()),
            ..Self::default()
        };
        if let Ok(key) = std::env::var(SERVER_KEY_ENV) {
            config.server_key = key;
        }
        if let Ok(url) = std::env::var(PROXY_URL_ENV) {
            config.set_proxy_url(&url);
        }
        config
    }

    /// Set endpoint, key and timeout in one call. Calling it again replaces all three.
    pub fn configure(&mut self, proxy_url: &str, server_key: &str, request_timeout: Duration) {
        self.set_proxy_url(proxy_url);
        self.server_key = server_key.to_string();
        self.request_timeout = request_timeout;
    }

    /// Accepts only `http`/`https` style values; anything else keeps the
    /// current URL. Returns whether the value was taken.
    pub fn set_proxy_url(&mut self, proxy_url: &str) -> bool {
        let trimmed = proxy_url.trim();
        if trimmed.starts_with("http") {
            self.proxy_url = trimmed.to_string();
            true
        } else {
            if !trimmed.is_empty() {
                warn!(proxy_url = %trimmed, "Ignoring proxy URL without http(s) scheme");
            }
            false
        }
    }

    /// `{proxy_url}/{server_key}`, with the key percent-encoded as one segment.
    pub fn target_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.proxy_url)?;
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidProxyUrl(self.proxy_url.clone()))?
            .pop_if_empty()
            .push(&self.server_key);
        Ok(url)
    }

    pub fn sends_bearer(&self) -> bool {
        self.auth == AuthMode::PathAndBearer && !self.server_key.is_empty()
    }
}
