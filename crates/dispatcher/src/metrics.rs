//! Dispatcher counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::CounterSnapshot;

/// Running totals owned by one dispatcher instance.
///
/// Created zeroed with the dispatcher and dropped with it. Each counter is
/// bumped while holding the lock of the structure it describes, so a snapshot
/// taken under that lock is consistent with the queue it reports on.
#[derive(Debug, Default)]
pub struct DispatchCounters {
    /// Values stored by enqueue
    accepted: AtomicU64,
    /// Values handed to a consumer
    delivered: AtomicU64,
    /// Values rejected due to a full queue
    dropped: AtomicU64,
    /// Values destroyed without delivery
    discarded: AtomicU64,
    /// Consumer panics
    faults: AtomicU64,
}

impl DispatchCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Add `n` discarded values (a whole queue can go at once)
    pub fn add_discarded(&self, n: u64) {
        if n > 0 {
            self.discarded.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn inc_faults(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            accepted: self.accepted(),
            delivered: self.delivered(),
            dropped: self.dropped(),
            discarded: self.discarded(),
            faults: self.faults(),
        }
    }
}
