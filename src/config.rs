use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::DEFAULT_CACHE_TTL_MS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub roster: RosterConfig,
  /// Auth service settings (defaults to the roster service URL)
  #[serde(default)]
  pub auth: AuthConfig,
  pub cache: CacheConfig,
  #[serde(default)]
  pub http: HttpConfig,
  /// How often `watch` asks the server for changes
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
  /// Base URL of the roster service, e.g. http://localhost:3000/api/employees
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Base URL of the cache service; requests go to `<url>/cache/...`
  pub url: String,
  /// Lifetime requested for cache entries, in milliseconds
  #[serde(default = "default_ttl_ms")]
  pub ttl_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_poll_interval_secs() -> u64 {
  60
}

fn default_ttl_ms() -> u64 {
  DEFAULT_CACHE_TTL_MS
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./rostersync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/rostersync/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/rostersync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("rostersync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("rostersync").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents)?;
    if config.poll_interval_secs == 0 {
      return Err(eyre!("poll_interval_secs must be greater than zero"));
    }
    Ok(config)
  }

  pub fn auth_url(&self) -> &str {
    self.auth.url.as_deref().unwrap_or(&self.roster.url)
  }

  pub fn http_timeout(&self) -> Duration {
    Duration::from_secs(self.http.timeout_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  /// Get the login password from environment variables.
  ///
  /// Checks ROSTERSYNC_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("ROSTERSYNC_PASSWORD")
      .map_err(|_| eyre!("Login password not found. Set ROSTERSYNC_PASSWORD environment variable."))
  }

  /// Get the cache encryption password from environment variables.
  ///
  /// Checks ROSTERSYNC_ENCRYPTION_PASSWORD. The value is never written to disk.
  pub fn get_encryption_password() -> Option<String> {
    std::env::var("ROSTERSYNC_ENCRYPTION_PASSWORD")
      .ok()
      .filter(|pw| !pw.is_empty())
  }
}
