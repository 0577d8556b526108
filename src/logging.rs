//! File-based tracing setup. Stdout is reserved for command output.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "rostersync.log";

/// Install the global subscriber writing to `<dir>/rostersync.log`.
///
/// Honors `RUST_LOG`, defaulting to `info`. The returned guard flushes
/// buffered lines when dropped and must be kept alive until exit.
pub fn init(dir: &Path) -> color_eyre::Result<WorkerGuard> {
  std::fs::create_dir_all(dir)?;

  let appender = tracing_appender::rolling::never(dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| color_eyre::eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
