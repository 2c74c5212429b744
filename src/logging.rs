//! Tracing configuration and log routing.
//!
//! Scans log to stdout using a compact formatter and to a file. When `GEOSCAN_LOG_FILE` is
//! set, logs are appended to that path; otherwise they go to `logs/geoscan.log`. The file
//! writer is non-blocking so per-file logging does not stall workers.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "GEOSCAN_LOG_FILE";
const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "geoscan.log";

/// Configure tracing subscribers for stdout and file logging.
///
/// Respects `RUST_LOG` (default `info`). Safe to call more than once; only the first call
/// installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let installed = match configure_file_writer() {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Build a non-blocking writer for file logging.
///
/// Returns `None` when the logs directory cannot be created or the target file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    let Ok(path) = std::env::var(LOG_FILE_ENV) else {
        if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
            eprintln!("Failed to create {LOG_DIR} directory: {err}");
            return None;
        }
        let file_appender = tracing_appender::rolling::never(LOG_DIR, LOG_FILE_NAME);
        return Some(install_writer(file_appender));
    };

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => Some(install_writer(file)),
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            None
        }
    }
}

fn install_writer<W: std::io::Write + Send + 'static>(writer: W) -> NonBlocking {
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let _ = LOG_GUARD.set(guard);
    non_blocking
}
