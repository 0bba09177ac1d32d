//! Server configuration
//!
//! Loaded from an optional TOML file. Every field has a default, so a
//! partial file (or none at all) is valid.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [hub]
//! subscriber_capacity = 256
//! max_subscribers = 0
//!
//! [logging]
//! filter = "livetrack=info,tower_http=info"
//! directory = "/var/log/livetrack"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from `path`, or return defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.hub.validate()?;
        Ok(config)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Broadcast hub settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Live events buffered per subscriber before new events are dropped for it
    pub subscriber_capacity: usize,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_subscribers: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            max_subscribers: 0,
        }
    }
}

impl HubConfig {
    /// Largest accepted per-subscriber queue capacity
    pub const MAX_SUBSCRIBER_CAPACITY: usize = 1 << 20;

    /// Set the per-subscriber queue capacity, clamped to
    /// `1..=MAX_SUBSCRIBER_CAPACITY`
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.clamp(1, Self::MAX_SUBSCRIBER_CAPACITY);
        self
    }

    /// Reject a capacity outside `1..=MAX_SUBSCRIBER_CAPACITY`
    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_SUBSCRIBER_CAPACITY).contains(&self.subscriber_capacity) {
            bail!(
                "hub.subscriber_capacity must be between 1 and {}, got {}",
                Self::MAX_SUBSCRIBER_CAPACITY,
                self.subscriber_capacity
            );
        }
        Ok(())
    }

    /// Set the maximum number of concurrent subscribers
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,

    /// Write a daily rolling log file here in addition to stderr
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "livetrack=info,tower_http=info".to_string(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.hub.subscriber_capacity, 256);
        assert_eq!(config.hub.max_subscribers, 0);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [hub]
            max_subscribers = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.hub.subscriber_capacity, 256);
        assert_eq!(config.hub.max_subscribers, 10);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("livetrack.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\n\n[logging]\ndirectory = \"logs\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:5000");
        assert_eq!(config.logging.directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[server]\nport = \"not a port\"\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load(Some(&temp_dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_builder() {
        let hub = HubConfig::default().subscriber_capacity(0).max_subscribers(3);
        assert_eq!(hub.subscriber_capacity, 1);
        assert_eq!(hub.max_subscribers, 3);

        let hub = HubConfig::default().subscriber_capacity(usize::MAX);
        assert_eq!(hub.subscriber_capacity, HubConfig::MAX_SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        let err = Config::from_toml("[hub]\nsubscriber_capacity = 4611686018427387904\n")
            .unwrap_err();
        assert!(err.to_string().contains("subscriber_capacity"));

        assert!(Config::from_toml("[hub]\nsubscriber_capacity = 0\n").is_err());
        assert!(Config::from_toml("[hub]\nsubscriber_capacity = 1048576\n").is_ok());
    }
}
