// Signal handling module
//
// Supported signals:
// - SIGHUP:  Reload configuration (slot capacity, poll interval, logging)
// - SIGTERM: Shutdown, in-flight connections are abandoned
// - SIGINT:  Shutdown (Ctrl+C)
//
// Signals are received on a dedicated thread, never inside the raw handler,
// so the bridge calls below run in ordinary thread context.

use std::io;
use std::sync::Arc;

use super::control::ControlBridge;
use crate::logger;

/// Start the signal routing thread (Unix only)
///
/// | Signal  | Action            |
/// |---------|-------------------|
/// | SIGHUP  | `request_reload`  |
/// | SIGTERM | `request_shutdown`|
/// | SIGINT  | `request_shutdown`|
#[cfg(unix)]
pub fn start_signal_handler(bridge: Arc<ControlBridge>) -> io::Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGHUP, SIGTERM, SIGINT])?;

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            logger::log_info(&format!(
                "[SIGNAL] Handlers registered (pid {}): HUP=reload, TERM/INT=shutdown",
                std::process::id()
            ));

            for signal in signals.forever() {
                match signal {
                    SIGHUP => {
                        logger::log_info("[SIGNAL] SIGHUP received, reloading configuration");
                        bridge.request_reload();
                    }
                    SIGTERM | SIGINT => {
                        let name = if signal == SIGTERM { "SIGTERM" } else { "SIGINT" };
                        logger::log_info(&format!("[SIGNAL] {name} received, shutting down"));
                        bridge.request_shutdown();
                        break;
                    }
                    _ => {}
                }
            }
        })?;

    Ok(())
}

/// Non-Unix fallback: no signal routing, the host must use the bridge directly
#[cfg(not(unix))]
pub fn start_signal_handler(_bridge: Arc<ControlBridge>) -> io::Result<()> {
    logger::log_warning("[SIGNAL] Signal routing is only supported on Unix");
    Ok(())
}
