// Connection servicing module
// Reads whatever the client sent, answers with the canned response

use std::io::Read;
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;

use crate::logger::ConnectionLogEntry;
use crate::response;

/// Size of the single read done per serviced connection
pub const READ_BUFFER_SIZE: usize = 2048;

/// An admitted client connection, owned by its slot
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub admitted_at: Instant,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            stream,
            peer_addr,
            admitted_at: Instant::now(),
        }
    }
}

/// How servicing went. The slot is released whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    Served,
    /// The read failed but the response went out anyway
    ReadFailed,
    /// The response was cut short
    ShortWrite,
    WriteFailed,
}

impl ServiceOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Served => "served",
            Self::ReadFailed => "read_failed",
            Self::ShortWrite => "short_write",
            Self::WriteFailed => "write_failed",
        }
    }

    pub const fn response_delivered(self) -> bool {
        matches!(self, Self::Served | Self::ReadFailed)
    }
}

/// Result of servicing one readable slot
#[derive(Debug, Clone, Copy)]
pub struct ServiceReport {
    pub outcome: ServiceOutcome,
    pub bytes_received: usize,
    pub bytes_sent: usize,
}

impl ServiceReport {
    pub fn log_entry(&self, conn: &Connection, slot: usize) -> ConnectionLogEntry {
        let mut entry = ConnectionLogEntry::new(conn.peer_addr.to_string(), slot);
        entry.bytes_received = self.bytes_received;
        entry.bytes_sent = self.bytes_sent;
        entry.outcome = self.outcome.label();
        entry.service_time_us =
            u64::try_from(conn.admitted_at.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry
    }
}

/// Service a readable connection.
///
/// The request is read once and ignored; zero bytes (client already closed
/// its side) and read errors are accepted. The response is always attempted.
pub fn service<S: Read + std::io::Write>(stream: &mut S) -> ServiceReport {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let read = stream.read(&mut buf);

    let expected = response::canned_response().len();
    let (write_outcome, bytes_sent) = match response::respond(stream) {
        Ok(n) if n == expected => (ServiceOutcome::Served, n),
        Ok(n) => (ServiceOutcome::ShortWrite, n),
        Err(_) => (ServiceOutcome::WriteFailed, 0),
    };

    let (outcome, bytes_received) = match read {
        Ok(n) => (write_outcome, n),
        Err(_) if write_outcome == ServiceOutcome::Served => (ServiceOutcome::ReadFailed, 0),
        Err(_) => (write_outcome, 0),
    };

    ServiceReport {
        outcome,
        bytes_received,
        bytes_sent,
    }
}
