// Server module entry point
// Listener, slot table, readiness loop and the control paths into it

pub mod connection;
pub mod control;
pub mod host;
pub mod listener;
pub mod signal;
pub mod slots;
pub mod stats;

// Rust does not allow `loop` as a module name (keyword), use server_loop instead
#[path = "loop.rs"]
pub mod server_loop;

// Re-export commonly used types
pub use control::ControlBridge;
pub use host::{HostProbe, HostWatch};
pub use server_loop::{LoopExit, ServerLoop};
pub use slots::{Rejected, SlotIndex, SlotTable};
pub use stats::{ServerStats, StatsSnapshot};
