//! Access log format module
//!
//! One line per serviced connection. Supported formats:
//! - `common` (space separated, CLF-like timestamp)
//! - `json` (one JSON object per line)
//! - Custom patterns with `$variables`

use chrono::Local;
use serde_json::json;

/// Record of one serviced connection
#[derive(Debug, Clone)]
pub struct ConnectionLogEntry {
    /// Client address, `-` when unknown
    pub remote_addr: String,
    pub time: chrono::DateTime<Local>,
    /// Slot index the connection occupied
    pub slot: usize,
    pub bytes_received: usize,
    pub bytes_sent: usize,
    /// Short outcome label (`served`, `read_failed`, `write_failed`, ...)
    pub outcome: &'static str,
    /// Time from admission to release in microseconds
    pub service_time_us: u64,
}

impl ConnectionLogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(remote_addr: String, slot: usize) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            slot,
            bytes_received: 0,
            bytes_sent: 0,
            outcome: "served",
            service_time_us: 0,
        }
    }

    /// Format the entry according to the configured format
    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    /// `$remote_addr - [$time_local] slot=$slot $bytes_received $bytes_sent $outcome`
    fn format_common(&self) -> String {
        format!(
            "{} - [{}] slot={} {} {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.slot,
            self.bytes_received,
            self.bytes_sent,
            self.outcome,
        )
    }

    fn format_json(&self) -> String {
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "slot": self.slot,
            "bytes_received": self.bytes_received,
            "bytes_sent": self.bytes_sent,
            "outcome": self.outcome,
            "service_time_us": self.service_time_us,
        })
        .to_string()
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables:
    /// - `$remote_addr` - Client address
    /// - `$time_local` - Local time in Common Log Format
    /// - `$time_iso8601` - ISO 8601 timestamp
    /// - `$slot` - Slot index
    /// - `$bytes_received` - Bytes read from the client
    /// - `$bytes_sent` - Bytes written to the client
    /// - `$outcome` - Outcome label
    /// - `$service_time` - Admission to release in seconds (3 decimal places)
    fn format_custom(&self, pattern: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let service_time = self.service_time_us as f64 / 1_000_000.0;

        pattern
            .replace("$remote_addr", &self.remote_addr)
            .replace(
                "$time_local",
                &self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            )
            .replace("$time_iso8601", &self.time.to_rfc3339())
            .replace("$slot", &self.slot.to_string())
            .replace("$bytes_received", &self.bytes_received.to_string())
            .replace("$bytes_sent", &self.bytes_sent.to_string())
            .replace("$outcome", self.outcome)
            .replace("$service_time", &format!("{service_time:.3}"))
    }
}
