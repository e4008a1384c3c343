//! Dispatch trait - common contract of every dispatcher variant

use crate::{ConsumerRef, CounterSnapshot, DispatchError, DispatchSnapshot, Variant};

/// Keyed publish/subscribe dispatcher
///
/// All methods take `&self`; implementations synchronise internally so one
/// instance can be shared by any number of producer and subscriber threads.
pub trait Dispatch<K, V>: Send + Sync {
    /// Concurrency design of this instance
    fn variant(&self) -> Variant;

    /// Spawn the worker if it is not already running
    ///
    /// # Errors
    /// Returns [`DispatchError::WorkerSpawn`] if the worker thread could not
    /// be created. Calling `start` on a running dispatcher is a no-op.
    fn start(&self) -> Result<(), DispatchError>;

    /// Signal the worker to exit and wait for it
    ///
    /// # Errors
    /// Returns [`DispatchError::WorkerPanicked`] if the worker could not be
    /// joined cleanly. Calling `stop` on a stopped dispatcher is a no-op.
    fn stop(&self) -> Result<(), DispatchError>;

    /// Whether a worker is currently running
    fn is_running(&self) -> bool;

    /// Bind `consumer` to `key` unless the key is already bound
    ///
    /// Returns `Ok(true)` if the binding was created and `Ok(false)` if an
    /// earlier binding was kept.
    ///
    /// # Errors
    /// Fixed-topology dispatchers return [`DispatchError::TopologyFrozen`]
    /// while running.
    fn subscribe(&self, key: K, consumer: ConsumerRef<K, V>) -> Result<bool, DispatchError>;

    /// Queue `value` for delivery on `key`
    ///
    /// Returns `false` without storing the value if the queue is full.
    fn enqueue(&self, key: K, value: V) -> bool;

    /// Queue depths and counters, read under the dispatcher's own locks
    fn snapshot(&self) -> DispatchSnapshot<K>;

    /// Counter totals only; takes no lock
    fn counter_snapshot(&self) -> CounterSnapshot;

    /// Runtime-topology view of this dispatcher, if it has one
    fn as_unsubscribe(&self) -> Option<&dyn Unsubscribe<K, V>> {
        None
    }
}

/// Dispatchers whose topology may change at runtime
pub trait Unsubscribe<K, V>: Dispatch<K, V> {
    /// Remove the binding for `key`
    ///
    /// Values still queued for `key` are discarded. Returns whether the key
    /// was known.
    fn unsubscribe(&self, key: &K) -> bool;
}
