// Configuration generation tracking
// Counts applied snapshots and remembers when the last one was applied.
// Lives inside the shared server stats, so it is read from other threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generation counter for applied configuration snapshots
///
/// Generation 1 is the startup configuration; each successful reload bumps it.
#[derive(Debug)]
pub struct ConfigGeneration {
    generation: AtomicU64,
    applied_at_ms: AtomicU64,
}

fn now_millis() -> u64 {
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or_default()
}

impl ConfigGeneration {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(1),
            applied_at_ms: AtomicU64::new(now_millis()),
        }
    }

    /// Record a newly applied snapshot, returning (generation, timestamp)
    pub fn increment(&self) -> (u64, u64) {
        let applied_at = now_millis();
        self.applied_at_ms.store(applied_at, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, applied_at)
    }

    pub fn get(&self) -> (u64, u64) {
        (
            self.generation.load(Ordering::SeqCst),
            self.applied_at_ms.load(Ordering::SeqCst),
        )
    }
}

impl Default for ConfigGeneration {
    fn default() -> Self {
        Self::new()
    }
}
