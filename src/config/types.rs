// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_MAX_SOCKETS: u32 = 5;
pub const DEFAULT_QUEUE_DEPTH: u32 = 32;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Main configuration structure
///
/// One value of this type is a complete snapshot. Reload replaces it
/// wholesale, never field by field.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Listener and slot table settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address, all IPv4 interfaces by default
    pub host: String,
    pub port: u16,
    /// Slot table capacity
    pub max_sockets: u32,
    /// Backlog passed to listen()
    pub queue_depth: u32,
    /// Upper bound of a single readiness wait
    pub poll_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "common".to_string()
}

/// Host supervision settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Exit immediately once the parent process is gone
    #[serde(default = "default_exit_on_parent_death")]
    pub exit_on_parent_death: bool,
}

#[allow(clippy::missing_const_for_fn)]
fn default_exit_on_parent_death() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            exit_on_parent_death: default_exit_on_parent_death(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_sockets: DEFAULT_MAX_SOCKETS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            host: HostConfig::default(),
        }
    }
}

/// Settings that only take effect when the listener is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenSettings {
    pub host: String,
    pub port: u16,
    pub queue_depth: u32,
}

impl From<&ServerConfig> for ListenSettings {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            queue_depth: server.queue_depth,
        }
    }
}
