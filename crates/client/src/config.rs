// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration management.
//!
//! Configuration is stored in `<config dir>/livecoll/config.toml` and includes:
//! - `url`: WebSocket address of the collection server
//! - `page_size` / `sort`: defaults for the initial bulk fetch
//! - `fetch_timeout_secs`: how long a bulk fetch may take
//! - `[reconnect]`: backoff policy for subscription channels

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backoff::ReconnectConfig;

const CONFIG_DIR_NAME: &str = "livecoll";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server URL (`ws://` or `wss://`).
    pub url: String,
    /// Records requested by the initial fetch.
    pub page_size: u32,
    /// Snapshot ordering, e.g. `-created` or `title,-updated`.
    pub sort: String,
    /// Bulk fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "ws://localhost:7890".to_string(),
            page_size: 20,
            sort: "-created".to_string(),
            fetch_timeout_secs: 10,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks values the server and channels depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "url '{}' must start with ws:// or wss://",
                self.url
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be greater than zero".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file location (`$XDG_CONFIG_HOME/livecoll/config.toml` on Linux).
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
