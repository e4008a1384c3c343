//! Diagnostic snapshot of a dispatcher
//!
//! Operator visibility only; nothing in the delivery path reads these.

use serde::Serialize;

use crate::Variant;

/// Running totals of one dispatcher instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Values stored in a queue by `enqueue`
    pub accepted: u64,
    /// Values handed to a consumer
    pub delivered: u64,
    /// Values rejected because the queue was full
    pub dropped: u64,
    /// Queued values destroyed without delivery (unsubscribe, unbound key)
    pub discarded: u64,
    /// Consumer calls that panicked
    pub faults: u64,
}

/// Pending values for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDepth<K> {
    pub key: K,
    /// Values waiting for the worker
    pub pending: usize,
    /// Whether a consumer is currently bound to the key
    pub bound: bool,
}

/// Point-in-time view of a dispatcher
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSnapshot<K> {
    pub variant: Variant,
    pub running: bool,
    /// Per-key queue occupancy, in directory order
    pub queues: Vec<QueueDepth<K>>,
    /// Total values waiting for the worker across all keys
    pub pending: usize,
    pub counters: CounterSnapshot,
}

impl<K> DispatchSnapshot<K> {
    /// Depth entry for `key`, if the key is known
    pub fn queue(&self, key: &K) -> Option<&QueueDepth<K>>
    where
        K: PartialEq,
    {
        self.queues.iter().find(|q| &q.key == key)
    }

    /// Number of keys with a bound consumer
    pub fn bound_keys(&self) -> usize {
        self.queues.iter().filter(|q| q.bound).count()
    }
}
