use color_eyre::{eyre::eyre, Result};
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE: &str = "miam.log";

/// Default log directory for the terminal UI, which owns stderr.
pub fn default_dir() -> Option<PathBuf> {
  dirs::data_dir().map(|dir| dir.join("miam").join("logs"))
}

/// Build the filter: RUST_LOG wins over the configured level.
fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
  match EnvFilter::try_from_default_env() {
    Ok(filter) => Ok(filter),
    Err(_) => EnvFilter::try_new(&config.level)
      .map_err(|e| eyre!("Invalid log level {:?}: {}", config.level, e)),
  }
}

/// Install the global subscriber.
///
/// Logs go to `miam.log` in the configured directory (or `fallback_dir`)
/// when there is one, otherwise to stderr. Keep the returned guard alive
/// until exit so buffered lines reach the file.
pub fn init(config: &LoggingConfig, fallback_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
  let env_filter = filter(config)?;

  let guard = match config.dir.clone().or(fallback_dir) {
    Some(dir) => {
      std::fs::create_dir_all(&dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let (writer, guard) = tracing_appender::non_blocking(rolling::never(&dir, LOG_FILE));
      let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter);

      tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;
      Some(guard)
    }
    None => {
      let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter);

      tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;
      None
    }
  };

  Ok(guard)
}
