// Configuration module entry point
// Loads layered configuration, validates it, and serves reload snapshots

mod source;
mod types;
mod version;

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logger::Level;

// Re-export public types
pub use source::{ConfigSource, FileSource, SnapshotSource};
pub use types::{
    Config, HostConfig, ListenSettings, LoggingConfig, ServerConfig, DEFAULT_HOST,
    DEFAULT_MAX_SOCKETS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_QUEUE_DEPTH,
};
pub use version::ConfigGeneration;

/// Default config file name, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "hello_httpd";

/// Prefix for environment overrides, e.g. `HELLO_HTTPD__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "HELLO_HTTPD";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// A missing file is not an error; defaults and environment still apply
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", DEFAULT_HOST)?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("server.max_sockets", i64::from(DEFAULT_MAX_SOCKETS))?
            .set_default("server.queue_depth", i64::from(DEFAULT_QUEUE_DEPTH))?
            .set_default("server.poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("host.exit_on_parent_death", true)?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("server.port", u64::from(self.server.port), 1, 65_535)?;
        check_range(
            "server.max_sockets",
            u64::from(self.server.max_sockets),
            1,
            65_535,
        )?;
        check_range(
            "server.queue_depth",
            u64::from(self.server.queue_depth),
            1,
            128,
        )?;
        check_range(
            "server.poll_interval_ms",
            self.server.poll_interval_ms,
            1,
            60_000,
        )?;

        if Level::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Unknown {
                field: "logging.level",
                value: self.logging.level.clone(),
            });
        }

        let format = self.logging.access_log_format.as_str();
        if !matches!(format, "common" | "json") && !format.contains('$') {
            return Err(ConfigError::Unknown {
                field: "logging.access_log_format",
                value: self.logging.access_log_format.clone(),
            });
        }

        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.server.host.trim_start_matches('[').trim_end_matches(']');
        let literal = if host.contains(':') {
            format!("[{host}]:{}", self.server.port)
        } else {
            format!("{host}:{}", self.server.port)
        };
        literal.parse().map_err(|_| ConfigError::Address(literal))
    }

    /// Slot table capacity as an index bound
    pub fn capacity(&self) -> usize {
        usize::try_from(self.server.max_sockets).unwrap_or(usize::MAX)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.server.poll_interval_ms)
    }

    /// The parts of this snapshot that only a restart can change
    pub fn listen_settings(&self) -> ListenSettings {
        ListenSettings::from(&self.server)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))
    }
}

const fn check_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
