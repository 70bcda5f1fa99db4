//! Configuration management for raft-store
//!
//! This module provides the configuration for the replicated store, including
//! builder pattern construction, environment variable overrides, and validation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use raft_store::config::{Config, ConfigBuilder};
//! use std::time::Duration;
//!
//! // Using builder pattern
//! let config = ConfigBuilder::new()
//!     .node_name("node-1")
//!     .snapshot_threshold(100)
//!     .pop_poll_attempts(10)
//!     .pop_backoff(Duration::from_millis(4), Duration::from_millis(100))
//!     .log_level("debug")
//!     .build()
//!     .expect("Failed to build config");
//!
//! // Loading from file (requires raft-store.toml to exist)
//! // let config = Config::from_file("raft-store.toml").expect("Failed to load config from file");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration field value
    #[error("Invalid configuration: {field}: {message}")]
    Invalid {
        /// The field that has invalid configuration
        field: String,
        /// Description of what makes it invalid
        message: String,
    },

    /// IO error occurred while reading/writing configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::de::Error),

    /// Environment variable processing error
    #[error("Environment variable error: {0}")]
    Environment(String),
}

/// Complete configuration for a raft-store node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// State machine settings
    pub store: StoreConfig,

    /// Client-side replication and polling
    pub client: ClientConfig,

    /// Logging and observability
    pub observability: ObservabilityConfig,
}

/// State machine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Human-readable node name, used in log output
    pub node_name: Option<String>,

    /// Snapshot configuration
    pub snapshot: SnapshotConfig,
}

/// Snapshot (log compaction) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Enable compaction requests
    pub enabled: bool,

    /// Number of applied entries after which to build a snapshot
    pub threshold_entries: u64,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum time to wait for the consensus engine to accept an entry
    #[serde(with = "humantime_serde")]
    pub replicate_timeout: Duration,

    /// How many times a pop re-reads the state looking for its lease
    pub pop_poll_attempts: u32,

    /// First delay between pop polls
    #[serde(with = "humantime_serde")]
    pub pop_initial_backoff: Duration,

    /// Upper bound of the doubling pop backoff
    #[serde(with = "humantime_serde")]
    pub pop_max_backoff: Duration,
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// Single-line
    Compact,
    /// JSON lines
    Json,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_entries: 50,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replicate_timeout: Duration::from_secs(5),
            pop_poll_attempts: 10,
            pop_initial_backoff: Duration::from_millis(4),
            pop_max_backoff: Duration::from_millis(100),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("RAFT_STORE_NODE_NAME") {
            self.store.node_name = Some(name);
        }

        if let Some(threshold) = lookup("RAFT_STORE_SNAPSHOT_THRESHOLD") {
            self.store.snapshot.threshold_entries = threshold.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid snapshot threshold: {}", e))
            })?;
        }

        if let Some(enabled) = lookup("RAFT_STORE_SNAPSHOT_ENABLED") {
            self.store.snapshot.enabled = enabled.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid snapshot enabled flag: {}", e))
            })?;
        }

        // Client configuration
        if let Some(timeout) = lookup("RAFT_STORE_REPLICATE_TIMEOUT_MS") {
            let timeout_ms: u64 = timeout.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid replicate timeout: {}", e))
            })?;
            self.client.replicate_timeout = Duration::from_millis(timeout_ms);
        }

        if let Some(attempts) = lookup("RAFT_STORE_POP_POLL_ATTEMPTS") {
            self.client.pop_poll_attempts = attempts.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid pop poll attempts: {}", e))
            })?;
        }

        // Observability configuration
        if let Some(log_level) = lookup("RAFT_STORE_LOG_LEVEL") {
            self.observability.logging.level = log_level;
        }

        if let Some(format) = lookup("RAFT_STORE_LOG_FORMAT") {
            self.observability.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.snapshot.enabled && self.store.snapshot.threshold_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "store.snapshot.threshold_entries".to_string(),
                message: "Threshold must be positive when snapshots are enabled".to_string(),
            });
        }

        if self.client.replicate_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "client.replicate_timeout".to_string(),
                message: "Replicate timeout must be positive".to_string(),
            });
        }

        if self.client.pop_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "client.pop_poll_attempts".to_string(),
                message: "At least one poll is required".to_string(),
            });
        }

        if self.client.pop_initial_backoff > self.client.pop_max_backoff {
            return Err(ConfigError::Invalid {
                field: "client.pop_initial_backoff".to_string(),
                message: "Initial backoff must not exceed the maximum backoff".to_string(),
            });
        }

        match self.observability.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Invalid {
                    field: "observability.logging.level".to_string(),
                    message: format!("Invalid log level: {}", self.observability.logging.level),
                });
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Environment(format!("Serialization failed: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration builder for fluent API construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the node name
    pub fn node_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.store.node_name = Some(name.into());
        self
    }

    /// Set the compaction threshold in entries
    pub fn snapshot_threshold(mut self, threshold_entries: u64) -> Self {
        self.config.store.snapshot.threshold_entries = threshold_entries;
        self
    }

    /// Enable or disable compaction requests
    pub fn snapshots(mut self, enabled: bool) -> Self {
        self.config.store.snapshot.enabled = enabled;
        self
    }

    /// Set the replicate timeout
    pub fn replicate_timeout(mut self, timeout: Duration) -> Self {
        self.config.client.replicate_timeout = timeout;
        self
    }

    /// Set how many times a pop polls for its lease
    pub fn pop_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.client.pop_poll_attempts = attempts;
        self
    }

    /// Set the pop backoff bounds
    pub fn pop_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.client.pop_initial_backoff = initial;
        self.config.client.pop_max_backoff = max;
        self
    }

    /// Set log level
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.observability.logging.level = level.into();
        self
    }

    /// Set log format
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.observability.logging.format = format;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ConfigResult<Config> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (useful for testing)
    pub fn build_unchecked(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                field: "observability.logging.format".to_string(),
                message: format!("Invalid log format: {}", s),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        assert!(config.store.snapshot.enabled);
        assert_eq!(config.store.snapshot.threshold_entries, 50);
        assert_eq!(config.client.pop_poll_attempts, 10);
        assert_eq!(config.client.pop_initial_backoff, Duration::from_millis(4));
        assert_eq!(config.client.pop_max_backoff, Duration::from_millis(100));
        assert_eq!(config.observability.logging.level, "info");
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .node_name("node-1")
            .snapshot_threshold(200)
            .pop_poll_attempts(3)
            .replicate_timeout(Duration::from_secs(1))
            .log_level("debug")
            .log_format(LogFormat::Json)
            .build()
            .expect("Failed to build config");

        assert_eq!(config.store.node_name.as_deref(), Some("node-1"));
        assert_eq!(config.store.snapshot.threshold_entries, 200);
        assert_eq!(config.client.pop_poll_attempts, 3);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation() {
        let config = ConfigBuilder::new().snapshot_threshold(0).build_unchecked();
        assert!(config.validate().is_err());

        // a zero threshold is fine once snapshots are off
        let config = ConfigBuilder::new()
            .snapshot_threshold(0)
            .snapshots(false)
            .build_unchecked();
        assert!(config.validate().is_ok());

        let config = ConfigBuilder::new()
            .pop_backoff(Duration::from_millis(500), Duration::from_millis(100))
            .build_unchecked();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().pop_poll_attempts(0).build_unchecked();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().log_level("loud").build_unchecked();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("raft-store.toml");

        let config = ConfigBuilder::new()
            .node_name("file-node")
            .snapshot_threshold(75)
            .build()
            .expect("valid config");
        config.save_to_file(&path).expect("save");

        let loaded = Config::from_file(&path).expect("load");
        assert_eq!(loaded.store.node_name.as_deref(), Some("file-node"));
        assert_eq!(loaded.client.pop_max_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [client]
            pop_initial_backoff = "10ms"

            [observability.logging]
            format = "compact"
            "#,
        )
        .expect("parse");
        assert_eq!(config.client.pop_initial_backoff, Duration::from_millis(10));
        assert_eq!(config.client.pop_poll_attempts, 10);
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("RAFT_STORE_SNAPSHOT_THRESHOLD", "12");
        std::env::set_var("RAFT_STORE_POP_POLL_ATTEMPTS", "4");
        std::env::set_var("RAFT_STORE_LOG_FORMAT", "json");

        let config = Config::from_env().expect("Failed to load config from env");

        assert_eq!(config.store.snapshot.threshold_entries, 12);
        assert_eq!(config.client.pop_poll_attempts, 4);
        assert_eq!(config.observability.logging.format, LogFormat::Json);

        std::env::remove_var("RAFT_STORE_SNAPSHOT_THRESHOLD");
        std::env::remove_var("RAFT_STORE_POP_POLL_ATTEMPTS");
        std::env::remove_var("RAFT_STORE_LOG_FORMAT");
    }

    #[test]
    fn test_invalid_snapshot_enabled_override() {
        let lookup = |value: &'static str| {
            move |name: &str| (name == "RAFT_STORE_SNAPSHOT_ENABLED").then(|| value.to_string())
        };

        let mut config = Config::default();
        let err = config.apply_overrides(lookup("yes")).unwrap_err();
        assert!(matches!(err, ConfigError::Environment(ref msg) if msg.contains("snapshot enabled")));
        assert!(config.store.snapshot.enabled);

        config.apply_overrides(lookup("false")).unwrap();
        assert!(!config.store.snapshot.enabled);
    }
}
