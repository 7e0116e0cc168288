mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mcprouter_transport::config::DEFAULT_ROUTER_API_URL;
use mcprouter_transport::{AuthMode, BridgeEvent, ProxyBridge, ProxyConfig, RouterClient};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// stdio-to-HTTP bridge for a remote MCP server.
///
/// Reads newline-delimited JSON-RPC from stdin, forwards every message to
/// `{proxy-url}/{server-key}` and writes each reply to stdout.
#[derive(Parser, Debug)]
#[command(name = "mcprouter")]
#[command(version, about)]
struct Args {
    /// Access key appended to the proxy URL. Falls back to $SERVER_KEY.
    #[arg(long, alias = "server_key", global = true)]
    server_key: Option<String>,

    /// Remote MCP endpoint base. Falls back to $PROXY_URL.
    #[arg(long, alias = "proxy_url")]
    proxy_url: Option<String>,

    /// Per-request round-trip timeout in milliseconds.
    /// Falls back to $MCPROUTER_REQUEST_TIMEOUT_MS, then 30000.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Also send the key as `Authorization: Bearer <key>`.
    #[arg(long)]
    bearer_auth: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List the tools available to the server key.
    ListTools {
        #[arg(long, default_value = DEFAULT_ROUTER_API_URL)]
        api_url: String,
    },
    /// Call one tool and print its result.
    CallTool {
        name: String,

        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        arguments: String,

        #[arg(long, default_value = DEFAULT_ROUTER_API_URL)]
        api_url: String,
    },
}

impl Args {
    /// Layer the command-line flags over `config`.
    fn apply_to(&self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(key) = &self.server_key {
            config.server_key = key.clone();
        }
        if let Some(url) = &self.proxy_url {
            config.set_proxy_url(url);
        }
        if let Some(ms) = self.timeout_ms.filter(|ms| *ms > 0) {
            config.request_timeout = Duration::from_millis(ms);
        }
        if self.bearer_auth {
            config.auth = AuthMode::PathAndBearer;
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));
    // A pending stdin read occupies a blocking thread that never finishes.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.apply_to(ProxyConfig::from_env());

    match args.command {
        None => serve(config).await,
        Some(Command::ListTools { api_url }) => {
            let client = RouterClient::with_api_base(config.server_key, &api_url)?;
            print_json(&client.list_tools().await?)
        }
        Some(Command::CallTool {
            name,
            arguments,
            api_url,
        }) => {
            let arguments: Value =
                serde_json::from_str(&arguments).context("--arguments must be valid JSON")?;
            let client = RouterClient::with_api_base(config.server_key, &api_url)?;
            print_json(&client.call_tool(&name, &arguments).await?)
        }
    }
}

async fn serve(config: ProxyConfig) -> anyhow::Result<()> {
    if config.server_key.is_empty() {
        warn!("No server key configured; set --server-key or SERVER_KEY");
    }
    info!(
        proxy_url = %config.proxy_url,
        timeout_ms = config.request_timeout.as_millis() as u64,
        auth = ?config.auth,
        "Starting mcprouter stdio bridge"
    );

    let mut bridge = ProxyBridge::new(config, tokio::io::stdout())?;
    let event_logger = tokio::spawn(log_events(bridge.subscribe()));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            signal_token.cancel();
        }
    });

    let result = bridge.run(tokio::io::stdin(), shutdown).await;
    drop(bridge);
    if let Err(e) = event_logger.await {
        warn!(error = %e, "Event logger task failed");
    }

    result.context("stdio bridge stopped")
}

async fn log_events(mut events: broadcast::Receiver<BridgeEvent>) {
    loop {
        match events.recv().await {
            Ok(BridgeEvent::Relayed(message)) => {
                debug!(method = ?message.method(), id = ?message.id(), "Relayed message");
            }
            Ok(BridgeEvent::Failed { kind, id, message }) => {
                warn!(kind = ?kind, id = ?id, "{message}");
            }
            Ok(BridgeEvent::Closed) | Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger fell behind");
            }
        }
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mcprouter_transport::config::DEFAULT_PROXY_URL;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_subcommand_runs_the_bridge() {
        let args = Args::try_parse_from(["mcprouter"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.server_key.is_none());
        assert!(!args.bearer_auth);
    }

    #[test]
    fn underscore_flag_spellings_are_accepted() {
        let args = Args::try_parse_from([
            "mcprouter",
            "--server_key=abc",
            "--proxy_url=http://localhost:8080/mcp",
        ])
        .unwrap();
        assert_eq!(args.server_key.as_deref(), Some("abc"));
        assert_eq!(args.proxy_url.as_deref(), Some("http://localhost:8080/mcp"));
    }

    #[test]
    fn flags_override_config() {
        let args = Args::try_parse_from([
            "mcprouter",
            "--server-key",
            "k1",
            "--proxy-url",
            "http://127.0.0.1:9000/mcp",
            "--timeout-ms",
            "1500",
            "--bearer-auth",
        ])
        .unwrap();
        let config = args.apply_to(ProxyConfig::default());
        assert_eq!(config.server_key, "k1");
        assert_eq!(config.proxy_url, "http://127.0.0.1:9000/mcp");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.auth, AuthMode::PathAndBearer);
    }

    #[test]
    fn invalid_flag_values_keep_defaults() {
        let args = Args::try_parse_from([
            "mcprouter",
            "--proxy-url",
            "router.mcp.so/mcp",
            "--timeout-ms",
            "0",
        ])
        .unwrap();
        let config = args.apply_to(ProxyConfig::default());
        assert_eq!(config.proxy_url, DEFAULT_PROXY_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn call_tool_subcommand() {
        let args = Args::try_parse_from([
            "mcprouter",
            "call-tool",
            "echo",
            "--arguments",
            r#"{"text":"hi"}"#,
            "--server-key",
            "k",
        ])
        .unwrap();
        assert_eq!(args.server_key.as_deref(), Some("k"));
        assert_eq!(
            args.command,
            Some(Command::CallTool {
                name: "echo".into(),
                arguments: r#"{"text":"hi"}"#.into(),
                api_url: DEFAULT_ROUTER_API_URL.into(),
            })
        );
    }

    #[test]
    fn list_tools_accepts_api_url() {
        let args =
            Args::try_parse_from(["mcprouter", "list-tools", "--api-url", "http://localhost/v1"])
                .unwrap();
        assert_eq!(
            args.command,
            Some(Command::ListTools {
                api_url: "http://localhost/v1".into()
            })
        );
    }
}
