// Control-flag bridge
// Carries shutdown and reload requests from other threads into the loop

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::{Registry, Token, Waker};

/// Shutdown and reload flags plus the waker that interrupts the loop's wait.
///
/// Writers only ever set flags; the loop thread is the sole reader and the
/// only one that clears them. Share it with `Arc`.
pub struct ControlBridge {
    shutdown_requested: AtomicBool,
    reload_requested: AtomicBool,
    waker: Waker,
}

impl ControlBridge {
    /// Create the bridge against the loop's poll registry
    pub fn new(registry: &Registry, token: Token) -> io::Result<Self> {
        Ok(Self {
            shutdown_requested: AtomicBool::new(false),
            reload_requested: AtomicBool::new(false),
            waker: Waker::new(registry, token)?,
        })
    }

    /// Ask the loop to exit. Abandons in-flight connections.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Ask the loop to apply the latest configuration snapshot
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Read and clear the reload flag. Loop thread only.
    pub fn take_reload(&self) -> bool {
        self.reload_requested.swap(false, Ordering::SeqCst)
    }

    fn wake(&self) {
        // A failed wake only delays the request until the next timeout tick
        let _ = self.waker.wake();
    }
}
