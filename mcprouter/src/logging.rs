//! # Logging Initialization
//!
//! stdout carries protocol traffic, so logs never go there. They are written
//! to the file given by `--log-file` when it can be opened, and to stderr
//! otherwise.
//!
//! Verbosity comes from `RUST_LOG`. Without it, everything logs at `info` and
//! the bridge crates at `debug`.

use anyhow::Result;
use std::ffi::OsStr;
use std::io::stderr;
use std::path::Path;
use std::sync::Once;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

pub const DEFAULT_FILTER: &str = "info,mcprouter=debug,mcprouter_transport=debug";

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        if let Some(path) = log_file
            && let Some(appender) = file_appender(path)
        {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer().with_writer(non_blocking).with_ansi(false))
                .init();
            // Leaked so buffered lines are flushed for the life of the process.
            Box::leak(Box::new(guard));
            return;
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(false))
            .init();

        if let Some(path) = log_file {
            tracing::warn!(path = %path.display(), "Cannot open log file, logging to stderr");
        }
    });

    Ok(())
}

/// A non-rotating appender for `path`, creating its directory if needed.
fn file_appender(path: &Path) -> Option<RollingFileAppender> {
    let (dir, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .ok()
}

fn split_log_path(path: &Path) -> Option<(&Path, &OsStr)> {
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn split_log_path_defaults_to_current_dir() {
        let (dir, name) = split_log_path(Path::new("bridge.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "bridge.log");

        let (dir, name) = split_log_path(Path::new("/tmp/mcp-server-router.log")).unwrap();
        assert_eq!(dir, Path::new("/tmp"));
        assert_eq!(name, "mcp-server-router.log");

        assert!(split_log_path(Path::new("/")).is_none());
    }

    #[test]
    fn file_appender_creates_missing_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("bridge.log");
        assert!(file_appender(&path).is_some());
        assert!(path.parent().unwrap().is_dir());
    }
}
