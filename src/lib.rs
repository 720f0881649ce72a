//! hello_httpd: a tiny embeddable TCP responder.
//!
//! A single-threaded readiness loop accepts connections into a
//! fixed-capacity slot table and answers each one with a canned HTTP/1.0
//! reply. Shutdown and reload requests reach the loop through
//! [`server::ControlBridge`].
//!
//! ```no_run
//! use hello_httpd::config::{Config, SnapshotSource};
//! use hello_httpd::server::{HostWatch, ServerLoop};
//!
//! let config = Config::default();
//! let source = SnapshotSource::new(config.clone());
//! let server = ServerLoop::new(config, source.clone(), HostWatch::Detached)?;
//! let bridge = server.bridge();
//! let worker = std::thread::spawn(move || server.run());
//!
//! // later, from the host
//! bridge.request_shutdown();
//! let _exit = worker.join();
//! # Ok::<(), hello_httpd::error::StartupError>(())
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod response;
pub mod server;
