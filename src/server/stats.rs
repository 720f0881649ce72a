// Loop counters
// Written by the loop thread only, readable from anywhere

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::config::ConfigGeneration;

#[derive(Debug, Default)]
pub struct ServerStats {
    occupied: AtomicUsize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    served: AtomicU64,
    write_failures: AtomicU64,
    ticks: AtomicU64,
    reloads: AtomicU64,
    generation: ConfigGeneration,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub occupied: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub served: u64,
    pub write_failures: u64,
    pub ticks: u64,
    pub reloads: u64,
    /// 1 for the startup configuration, bumped by each applied reload
    pub generation: u64,
    /// Unix milliseconds at which the current generation took effect
    pub config_applied_at_ms: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (generation, config_applied_at_ms) = self.generation.get();
        StatsSnapshot {
            occupied: self.occupied.load(Ordering::SeqCst),
            accepted: self.accepted.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            served: self.served.load(Ordering::SeqCst),
            write_failures: self.write_failures.load(Ordering::SeqCst),
            ticks: self.ticks.load(Ordering::SeqCst),
            reloads: self.reloads.load(Ordering::SeqCst),
            generation,
            config_applied_at_ms,
        }
    }

    pub fn occupied(&self) -> usize {
        self.occupied.load(Ordering::SeqCst)
    }

    pub(crate) fn set_occupied(&self, occupied: usize) {
        self.occupied.store(occupied, Ordering::SeqCst);
    }

    pub(crate) fn record_admitted(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_served(&self, write_ok: bool) {
        self.served.fetch_add(1, Ordering::SeqCst);
        if !write_ok {
            self.write_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    /// Count an applied reload, returning the new (generation, timestamp)
    pub(crate) fn record_reload(&self) -> (u64, u64) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.generation.increment()
    }
}
