//! Error types for configuration loading and listener setup.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered file/environment source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// A numeric setting fell outside its accepted range.
    #[error("Invalid value {value} for {field}: expected {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Host and port did not form a socket address.
    #[error("Invalid listen address '{0}'")]
    Address(String),

    /// Unknown logging level or format name.
    #[error("Invalid {field}: '{value}'")]
    Unknown { field: &'static str, value: String },
}

/// Which step of listener setup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStep {
    Socket,
    Options,
    Bind,
    Listen,
}

impl std::fmt::Display for ListenerStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Socket => write!(f, "socket()"),
            Self::Options => write!(f, "setsockopt()"),
            Self::Bind => write!(f, "bind()"),
            Self::Listen => write!(f, "listen()"),
        }
    }
}

/// Listener creation failure. Always fatal for the process.
#[derive(Debug, Error)]
#[error("{step} error on {addr}: {source}")]
pub struct ListenerError {
    pub step: ListenerStep,
    pub addr: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

/// Anything that prevents the loop from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Poll or waker setup failed.
    #[error("Failed to create readiness poller: {0}")]
    Poll(#[source] std::io::Error),

    #[error("Failed to open log file: {0}")]
    Logger(#[source] std::io::Error),

    #[error("Failed to register signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}
