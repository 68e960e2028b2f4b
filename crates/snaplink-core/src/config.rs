//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/snaplink/config.toml)
//! 3. Environment variables (SNAPLINK_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "SNAPLINK";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, blobs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Origin that share URLs are built from
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Collection that link records are stored in
    #[serde(default = "default_links_collection")]
    pub links_collection: String,

    /// How long the "copied" confirmation stays visible
    #[serde(default = "default_copy_reset_ms")]
    pub copy_reset_ms: u64,

    /// First delay before a live query resubscribes after a disconnect
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the resubscribe backoff
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Image shown when a profile picture cannot be resolved
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            origin: default_origin(),
            links_collection: default_links_collection(),
            copy_reset_ms: default_copy_reset_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            placeholder_image_url: default_placeholder_image_url(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SNAPLINK_DATA_DIR, SNAPLINK_ORIGIN, SNAPLINK_LINKS_COLLECTION)
    /// 2. Config file (~/.config/snaplink/config.toml or SNAPLINK_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_ORIGIN", ENV_PREFIX)) {
            if !val.is_empty() {
                self.origin = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LINKS_COLLECTION", ENV_PREFIX)) {
            if !val.is_empty() {
                self.links_collection = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Set a single value by key, as used by `snaplink config set`
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        let millis = |value: &str| -> Result<u64> {
            value
                .parse()
                .with_context(|| format!("'{}' expects a number of milliseconds", key))
        };

        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "origin" => self.origin = value.trim_end_matches('/').to_string(),
            "links_collection" => self.links_collection = value.to_string(),
            "copy_reset_ms" => self.copy_reset_ms = millis(value)?,
            "reconnect_initial_ms" => self.reconnect_initial_ms = millis(value)?,
            "reconnect_max_ms" => self.reconnect_max_ms = millis(value)?,
            "placeholder_image_url" => self.placeholder_image_url = value.to_string(),
            _ => bail!(
                "Unknown config key '{}'. Valid keys: data_dir, origin, links_collection, \
                 copy_reset_ms, reconnect_initial_ms, reconnect_max_ms, placeholder_image_url",
                key
            ),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SNAPLINK_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snaplink")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("snaplink.db")
    }

    /// Get the directory blobs are stored under
    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn copy_reset_delay(&self) -> Duration {
        Duration::from_millis(self.copy_reset_ms)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snaplink")
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_links_collection() -> String {
    "links".to_string()
}

fn default_copy_reset_ms() -> u64 {
    2000
}

fn default_reconnect_initial_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_placeholder_image_url() -> String {
    "https://via.placeholder.com/150".to_string()
}
