//! Consumer capability - Dispatcher output interface

use std::sync::Arc;

/// Delivery target bound to a topic key.
///
/// The worker thread calls [`consume`](Consumer::consume) once per queued
/// value, in enqueue order for a given key. There is no return value: the
/// dispatcher does not retry and does not wait for acknowledgement.
///
/// A panic raised by `consume` is caught by the worker, counted as a fault
/// and logged; delivery continues with the next value.
pub trait Consumer<K, V>: Send + Sync {
    /// Handle one value published on `key`.
    fn consume(&self, key: &K, value: &V);
}

/// Shared handle to a consumer.
///
/// A binding holds its own clone, so the consumer stays alive for as long as
/// it is subscribed even if the caller drops its handle first.
pub type ConsumerRef<K, V> = Arc<dyn Consumer<K, V>>;
