use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::FetchOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the service (the `/api/...` routes hang off it)
  pub url: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:3000".to_string(),
      timeout_secs: 10,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds a fetched catalog entry stays live; 0 keeps it for the whole session
  pub ttl_secs: u64,
  pub stale_while_revalidate: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: 60,
      stale_while_revalidate: true,
    }
  }
}

impl CacheConfig {
  pub fn fetch_options(&self) -> FetchOptions {
    FetchOptions::default()
      .with_ttl(Duration::from_secs(self.ttl_secs))
      .with_stale_while_revalidate(self.stale_while_revalidate)
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  /// SQLite file under the data directory
  #[default]
  Sqlite,
  /// Nothing survives the process
  Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub backend: StorageBackend,
  /// Overrides the default SQLite location
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default filter when RUST_LOG is unset
  pub level: String,
  /// Write logs to a file in this directory instead of stderr
  pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./miam.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/miam/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("miam.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("miam").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the API token from the environment.
  ///
  /// Reads MIAM_API_TOKEN. Requests go out unauthenticated without it.
  pub fn api_token() -> Option<String> {
    std::env::var("MIAM_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.url, "http://localhost:3000");
    assert_eq!(config.api.timeout(), Duration::from_secs(10));
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.logging.level, "info");

    let options = config.cache.fetch_options();
    assert_eq!(options.ttl, Duration::from_secs(60));
    assert!(options.stale_while_revalidate);
  }

  #[test]
  fn test_partial_sections() {
    let config = Config::parse(
      r#"
api:
  url: https://miam.example.com
cache:
  ttl_secs: 0
storage:
  backend: memory
"#,
    )
    .unwrap();

    assert_eq!(config.api.url, "https://miam.example.com");
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.cache.fetch_options().ttl, Duration::ZERO);
    assert!(config.cache.stale_while_revalidate);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert!(config.storage.path.is_none());
  }

  #[test]
  fn test_unknown_backend_is_rejected() {
    assert!(Config::parse("storage:\n  backend: redis\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/miam.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("miam.yaml");
    std::fs::write(&path, "logging:\n  level: debug\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "debug");
  }
}
