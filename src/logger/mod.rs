//! Logger module
//!
//! Provides logging utilities for the responder including:
//! - Server lifecycle logging (start, reload, shutdown, emergency exit)
//! - Per-connection access logging with multiple formats
//! - Level-filtered error, warning, info and debug lines
//! - File-based logging support

mod format;
pub mod writer;

pub use format::ConnectionLogEntry;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Local, Utc};

use crate::config::Config;
use crate::server::StatsSnapshot;

/// Log threshold, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" | "trace" => Some(Self::Debug),
            _ => None,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            _ => Self::Debug,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    apply_level(config);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Adopt the level of a (possibly reloaded) configuration
pub fn apply_level(config: &Config) {
    if let Some(level) = Level::parse(&config.logging.level) {
        set_level(level);
    }
}

pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level <= self::level()
}

fn stamp(message: &str) -> String {
    format!("{} {message}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(&stamp(message)),
        None => println!("{}", stamp(message)),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(&stamp(message)),
        None => eprintln!("{}", stamp(message)),
    }
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(Level::Warn) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_info(message: &str) {
    if enabled(Level::Info) {
        write_info(&format!("[INFO] {message}"));
    }
}

pub fn log_debug(message: &str) {
    if enabled(Level::Debug) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    log_info("======================================");
    log_info("hello_httpd started");
    log_info(&format!("Listening on: http://{addr}"));
    log_info(&format!("Max concurrent sockets: {}", config.server.max_sockets));
    log_info(&format!("Listen backlog: {}", config.server.queue_depth));
    log_info(&format!("Poll interval: {}ms", config.server.poll_interval_ms));
    log_info(&format!("Log level: {}", config.logging.level));
    if let Some(ref path) = config.logging.access_log_file {
        log_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        log_info(&format!("Error log: {path}"));
    }
    log_info("======================================");
}

pub fn log_connection_admitted(peer_addr: &SocketAddr, slot: usize) {
    log_debug(&format!("[Connection] Accepted from {peer_addr} into slot {slot}"));
}

pub fn log_capacity_exceeded(peer_addr: &SocketAddr, occupied: usize, capacity: usize) {
    log_warning(&format!(
        "server too busy: {occupied}/{capacity} slots occupied, dropped {peer_addr}"
    ));
}

pub fn log_accept_error(err: &std::io::Error) {
    log_warning(&format!("accept() error: {err}"));
}

pub fn log_poll_error(err: &std::io::Error) {
    log_error(&format!("poll() error: {err}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &ConnectionLogEntry, format: &str) {
    if enabled(Level::Info) {
        match writer::get() {
            Some(w) => w.write_info(&entry.format(format)),
            None => println!("{}", entry.format(format)),
        }
    }
}

pub fn log_reload_applied(generation: u64, applied_at_ms: u64, config: &Config) {
    log_info(&format!(
        "[Reload] Configuration generation {generation} applied at {} \
         (max_sockets={}, poll_interval={}ms, level={})",
        format_epoch_millis(applied_at_ms),
        config.server.max_sockets,
        config.server.poll_interval_ms,
        config.logging.level
    ));
}

fn format_epoch_millis(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || millis.to_string(),
            |at| {
                at.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S%.3f")
                    .to_string()
            },
        )
}

pub fn log_reload_failed(err: &impl std::fmt::Display) {
    log_error(&format!("[Reload] {err}; keeping current configuration"));
}

pub fn log_restart_required(setting: &str, running: &str, requested: &str) {
    log_warning(&format!(
        "[Reload] {setting} change {running} -> {requested} requires a restart; \
         still using {running}"
    ));
}

pub fn log_shutdown(stats: &StatsSnapshot, abandoned: &[usize]) {
    log_info(&format!(
        "[Shutdown] Stopping at configuration generation {}: {} accepted, {} served, \
         {} rejected, {} write failures",
        stats.generation, stats.accepted, stats.served, stats.rejected, stats.write_failures
    ));
    if !abandoned.is_empty() {
        log_info(&format!(
            "[Shutdown] Abandoning {} in-flight connection(s) in slots {abandoned:?}",
            abandoned.len()
        ));
    }
}

pub fn log_host_died() {
    log_error("host process is gone, exiting immediately");
}
