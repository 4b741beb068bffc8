//! Logger configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! root_dir = "/var/log/workflow"
//! root_markers = ["ARQ-ALPHA", "ARQ_ALPHA"]
//! queue_capacity = 10000
//! drain_timeout_ms = 2000
//! echo_entries = true
//! initial_entry = true
//! retention_days = 7
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LoggerError, Result};

/// Environment variable overriding the logging directory.
pub const ENV_DIR: &str = "EXECLOG_DIR";
/// Environment variable setting a bounded queue capacity.
pub const ENV_QUEUE_CAPACITY: &str = "EXECLOG_QUEUE_CAPACITY";
/// Environment variable setting the shutdown drain timeout in milliseconds.
pub const ENV_DRAIN_TIMEOUT_MS: &str = "EXECLOG_DRAIN_TIMEOUT_MS";
/// Environment variable setting the default retention age in days.
pub const ENV_RETENTION_DAYS: &str = "EXECLOG_RETENTION_DAYS";

/// Session logger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Directory where session files are created.
    ///
    /// When unset the directory is resolved from `root_markers`, falling
    /// back to the current working directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Ancestor directory name fragments identifying the application root.
    #[serde(default)]
    pub root_markers: Vec<String>,

    /// Bounded queue capacity. `None` keeps the queue unbounded.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// How long shutdown waits for queued blocks to be written.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Echo every written entry as a `tracing` debug event.
    #[serde(default = "default_true")]
    pub echo_entries: bool,

    /// Write a "log started" entry right after the header.
    #[serde(default = "default_true")]
    pub initial_entry: bool,

    /// Default age used by the periodic retention sweep.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_drain_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    7
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            root_markers: Vec::new(),
            queue_capacity: None,
            drain_timeout_ms: default_drain_timeout_ms(),
            echo_entries: default_true(),
            initial_entry: default_true(),
            retention_days: default_retention_days(),
        }
    }
}

impl LoggerConfig {
    /// Parse settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoggerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loading logger config");
        Self::from_toml_str(&content)
    }

    /// Create settings from environment variables on top of the defaults.
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(ENV_DIR)
            && !dir.is_empty()
        {
            config.root_dir = Some(PathBuf::from(dir));
        }

        if let Ok(capacity) = std::env::var(ENV_QUEUE_CAPACITY)
            && let Ok(capacity) = capacity.parse::<usize>()
            && capacity > 0
        {
            config.queue_capacity = Some(capacity);
        }

        if let Ok(timeout) = std::env::var(ENV_DRAIN_TIMEOUT_MS)
            && let Ok(timeout) = timeout.parse::<u64>()
        {
            config.drain_timeout_ms = timeout;
        }

        if let Ok(days) = std::env::var(ENV_RETENTION_DAYS)
            && let Ok(days) = days.parse::<u32>()
        {
            config.retention_days = days;
        }

        config
    }

    /// Set the logging directory.
    pub fn with_root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(dir.into());
        self
    }

    /// Add a root marker used when `root_dir` is unset.
    pub fn with_root_marker(mut self, marker: impl Into<String>) -> Self {
        self.root_markers.push(marker.into());
        self
    }

    /// Bound the queue. Blocks offered to a full queue are dropped.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Set the shutdown drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Toggle the initial "log started" entry.
    pub fn with_initial_entry(mut self, enabled: bool) -> Self {
        self.initial_entry = enabled;
        self
    }

    /// Toggle the per-entry debug echo.
    pub fn with_echo_entries(mut self, enabled: bool) -> Self {
        self.echo_entries = enabled;
        self
    }

    /// Shutdown drain timeout as a `Duration`.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.queue_capacity == Some(0) {
            return Err(LoggerError::InvalidArgument {
                name: "queue_capacity",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_settings() {
        let config = LoggerConfig::default();
        assert!(config.root_dir.is_none());
        assert!(config.queue_capacity.is_none());
        assert_eq!(config.drain_timeout(), Duration::from_secs(2));
        assert!(config.echo_entries);
        assert!(config.initial_entry);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = LoggerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LoggerConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = LoggerConfig::from_toml_str(
            r#"
            root_dir = "/tmp/logs"
            root_markers = ["ARQ-ALPHA"]
            queue_capacity = 64
            drain_timeout_ms = 500
            initial_entry = false
            "#,
        )
        .unwrap();
        assert_eq!(config.root_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.root_markers, vec!["ARQ-ALPHA".to_string()]);
        assert_eq!(config.queue_capacity, Some(64));
        assert_eq!(config.drain_timeout(), Duration::from_millis(500));
        assert!(!config.initial_entry);
        assert!(config.echo_entries);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LoggerConfig::from_toml_str("queue_capacity = 0").unwrap_err();
        assert!(matches!(err, LoggerError::InvalidArgument { name: "queue_capacity", .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LoggerConfig::load("/definitely/not/here/execlog.toml").unwrap_err();
        assert!(matches!(err, LoggerError::ConfigRead { .. }));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::set_var(ENV_DIR, "/tmp/execlog-env");
            std::env::set_var(ENV_QUEUE_CAPACITY, "128");
            std::env::set_var(ENV_DRAIN_TIMEOUT_MS, "not-a-number");
        }

        let config = LoggerConfig::from_env();
        assert_eq!(config.root_dir, Some(PathBuf::from("/tmp/execlog-env")));
        assert_eq!(config.queue_capacity, Some(128));
        assert_eq!(config.drain_timeout_ms, 2000);

        unsafe {
            std::env::remove_var(ENV_DIR);
            std::env::remove_var(ENV_QUEUE_CAPACITY);
            std::env::remove_var(ENV_DRAIN_TIMEOUT_MS);
        }
    }
}
