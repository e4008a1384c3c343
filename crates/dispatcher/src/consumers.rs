//! Ready-made consumers
//!
//! `NoopConsumer` is the load-harness target; `RecordingConsumer` keeps the
//! delivery log for assertions.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::Consumer;
use parking_lot::Mutex;

/// Consumer that only counts calls
#[derive(Debug, Default)]
pub struct NoopConsumer {
    consumed: AtomicU64,
}

impl NoopConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values received
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}

impl<K, V> Consumer<K, V> for NoopConsumer {
    fn consume(&self, _key: &K, _value: &V) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer that records every `(key, value)` in delivery order
pub struct RecordingConsumer<K, V> {
    log: Mutex<Vec<(K, V)>>,
    _marker: PhantomData<fn(K, V)>,
}

impl<K, V> Default for RecordingConsumer<K, V> {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }
}

impl<K, V> RecordingConsumer<K, V>
where
    K: Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery log, oldest first
    pub fn records(&self) -> Vec<(K, V)> {
        self.log.lock().clone()
    }

    /// Delivered values, oldest first
    pub fn values(&self) -> Vec<V> {
        self.log.lock().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

impl<K, V> Consumer<K, V> for RecordingConsumer<K, V>
where
    K: Clone + Send,
    V: Clone + Send,
{
    fn consume(&self, key: &K, value: &V) {
        self.log.lock().push((key.clone(), value.clone()));
    }
}
