//! # mcprouter transport
//!
//! Bridges a line-delimited JSON-RPC session on a local byte stream (in
//! practice stdin/stdout) to a remote MCP endpoint reached over HTTP.
//!
//! ## Architecture
//!
//! *   **Frame Reader** ([`ReadBuffer`]): accumulates input bytes and yields
//!     complete newline-delimited messages in arrival order.
//! *   **Proxy Bridge** ([`ProxyBridge`]): forwards each message as an HTTP POST
//!     to `{proxy_url}/{server_key}`, carries the `Mcp-Session-Id` across
//!     calls, bounds every round trip by a timeout and writes exactly one
//!     reply (or a synthesized `-32603` error) back before taking the next
//!     message.
//! *   **Events** ([`BridgeEvent`]): relayed messages and failures are published
//!     on a broadcast channel for observability.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcprouter_transport::{ProxyBridge, ProxyConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> mcprouter_transport::Result<()> {
//! let mut config = ProxyConfig::from_env();
//! config.server_key = "my-server-key".to_string();
//!
//! let mut bridge = ProxyBridge::new(config, tokio::io::stdout())?;
//! bridge.run(tokio::io::stdin(), CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod framing;
pub mod message;
pub mod proxy;
pub mod router_client;
pub mod session;
pub mod sse;
pub mod state;

pub use bridge::{BridgeHandle, ProxyBridge};
pub use config::{AuthMode, ProxyConfig};
pub use error::{BridgeError, FailureKind, Result};
pub use events::BridgeEvent;
pub use framing::ReadBuffer;
pub use message::{JsonRpcMessage, RequestId};
pub use proxy::{ProxyClient, RemoteReply};
pub use router_client::RouterClient;
pub use session::SessionToken;
pub use state::RelayState;
