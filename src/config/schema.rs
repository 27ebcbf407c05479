//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! manager. All types derive Serde traits for deserialization from the
//! config file, and every section has defaults matching a stock
//! nginx-on-systemd host.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Filesystem layout of the managed nginx installation.
    pub paths: PathsConfig,

    /// Durable record store location.
    pub store: StoreConfig,

    /// External command lines for syntax checking and reloading.
    pub commands: CommandsConfig,

    /// Timeout bounds for the external calls.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Filesystem layout of the managed configuration set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one rendered config file per domain.
    pub sites_available: PathBuf,

    /// Directory holding one enabling symlink per domain.
    pub sites_enabled: PathBuf,

    /// Directory for per-domain access/error logs.
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sites_available: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            log_dir: PathBuf::from("/var/log/nginx/nginx-manager"),
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON store file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/nginx-manager/store.json"),
        }
    }
}

/// External command lines, argv style.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Syntax checker for the whole active configuration tree.
    pub check: Vec<String>,

    /// Service-manager reload of the running proxy process.
    pub reload: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            check: vec!["nginx".to_string(), "-t".to_string()],
            reload: vec![
                "systemctl".to_string(),
                "reload".to_string(),
                "nginx".to_string(),
            ],
        }
    }
}

/// Timeout configuration for the external calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Syntax check timeout in seconds.
    pub check_secs: u64,

    /// Reload timeout in seconds.
    pub reload_secs: u64,
}

impl TimeoutConfig {
    pub fn check(&self) -> Duration {
        Duration::from_secs(self.check_secs)
    }

    pub fn reload(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            check_secs: 30,
            reload_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_layout() {
        let config = ManagerConfig::default();
        assert_eq!(
            config.paths.sites_available,
            PathBuf::from("/etc/nginx/sites-available")
        );
        assert_eq!(config.commands.check, vec!["nginx", "-t"]);
        assert_eq!(config.timeouts.check_secs, 30);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ManagerConfig = toml::from_str(
            r#"
            [paths]
            sites_available = "/tmp/avail"

            [timeouts]
            check_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.sites_available, PathBuf::from("/tmp/avail"));
        assert_eq!(
            config.paths.sites_enabled,
            PathBuf::from("/etc/nginx/sites-enabled")
        );
        assert_eq!(config.timeouts.check(), Duration::from_secs(5));
        assert_eq!(config.timeouts.reload(), Duration::from_secs(30));
    }
}
