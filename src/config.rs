use chrono::FixedOffset;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auction::{parse_utc_offset, DisplayZone};
use crate::cache::DEFAULT_TTL_SECS;
use crate::countdown::CountdownSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub countdown: CountdownConfig,
  #[serde(default)]
  pub display: DisplayConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base url of the auction API, e.g. "https://api.example.com/v1/"
  pub url: String,
  pub username: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched collections stay fresh
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: i64,
}

fn default_ttl_secs() -> i64 {
  DEFAULT_TTL_SECS
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: DEFAULT_TTL_SECS,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.ttl_secs.max(0))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountdownConfig {
  #[serde(default = "default_tick_ms")]
  pub tick_ms: u64,
  /// Interval of the scroll-settle check while paused
  #[serde(default = "default_scroll_poll_ms")]
  pub scroll_poll_ms: u64,
}

fn default_tick_ms() -> u64 {
  1000
}

fn default_scroll_poll_ms() -> u64 {
  500
}

impl Default for CountdownConfig {
  fn default() -> Self {
    Self {
      tick_ms: default_tick_ms(),
      scroll_poll_ms: default_scroll_poll_ms(),
    }
  }
}

impl CountdownConfig {
  pub fn settings(&self) -> CountdownSettings {
    // tokio intervals panic on a zero period
    CountdownSettings {
      tick_interval: Duration::from_millis(self.tick_ms.max(1)),
      scroll_poll_interval: Duration::from_millis(self.scroll_poll_ms.max(1)),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
  /// Zone for local end times, e.g. "+02:00". Defaults to the system zone.
  #[serde(default, deserialize_with = "deserialize_utc_offset")]
  pub utc_offset: Option<FixedOffset>,
}

fn deserialize_utc_offset<'de, D>(deserializer: D) -> Result<Option<FixedOffset>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(deserializer)?;
  raw
    .map(|s| parse_utc_offset(&s).map_err(serde::de::Error::custom))
    .transpose()
}

impl DisplayConfig {
  pub fn zone(&self) -> DisplayZone {
    match self.utc_offset {
      Some(offset) => DisplayZone::Fixed(offset),
      None => DisplayZone::System,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Default filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write daily log files here instead of stderr
  #[serde(default)]
  pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./snipewatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/snipewatch/config.yaml
  /// 4. ~/.config/snipewatch/config.yaml
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
        "No configuration file found. Create one at ~/.config/snipewatch/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("snipewatch.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("snipewatch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  /// Get the auction API token from environment variables.
  ///
  /// Checks SNIPEWATCH_API_TOKEN first, then AUCTION_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("SNIPEWATCH_API_TOKEN")
      .or_else(|_| std::env::var("AUCTION_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "API token not found. Set SNIPEWATCH_API_TOKEN or AUCTION_API_TOKEN environment variable."
        )
      })
  }
}
