//! SplitLockDispatcher - global FIFO and consumer directory behind two locks
//!
//! Enqueue touches only the FIFO lock; subscribe and unsubscribe touch only
//! the directory lock. The worker swaps the whole FIFO out under the first
//! lock, then resolves and delivers each value under the second.
//!
//! Every accepted value carries an arrival sequence number and every binding
//! records the sequence number current when it was created. A value is only
//! delivered to a binding that already existed when the value arrived.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{
    ConsumerRef, CounterSnapshot, Dispatch, DispatchError, DispatchSnapshot, DispatcherConfig,
    QueueDepth, Unsubscribe, Variant,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, instrument, trace};

use crate::delivery::deliver;
use crate::handle::WorkerSlot;
use crate::metrics::DispatchCounters;

struct Queued<K, V> {
    seq: u64,
    key: K,
    value: V,
}

struct Binding<K, V> {
    consumer: ConsumerRef<K, V>,
    /// Arrival sequence number at bind time
    since: u64,
}

struct Inbox<K, V> {
    /// Pending values of every key, in arrival order
    fifo: VecDeque<Queued<K, V>>,
    /// Set by `stop`, cleared by `start`
    shutdown: bool,
}

struct Shared<K, V> {
    inbox: Mutex<Inbox<K, V>>,
    wake: Condvar,
    consumers: Mutex<HashMap<K, Binding<K, V>>>,
    /// Next arrival sequence number; only advanced under the inbox lock
    next_seq: AtomicU64,
    counters: DispatchCounters,
    config: DispatcherConfig,
}

impl<K, V> Shared<K, V> {
    fn signal_shutdown(&self) {
        self.inbox.lock().shutdown = true;
        self.wake.notify_one();
    }
}

/// Keyed dispatcher with decoupled message and subscription locks.
///
/// Capacity is a single bound shared by all keys. A value whose key has no
/// consumer when the worker reaches it, or whose consumer was bound after the
/// value arrived, is discarded and counted; it is not held for a later
/// subscriber.
pub struct SplitLockDispatcher<K, V> {
    shared: Arc<Shared<K, V>>,
    worker: WorkerSlot,
}

impl<K, V> SplitLockDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    /// Create a stopped dispatcher with an empty FIFO and directory
    pub fn new(config: DispatcherConfig) -> Self {
        let worker = WorkerSlot::new(config.worker_name.clone());
        Self {
            shared: Arc::new(Shared {
                inbox: Mutex::new(Inbox {
                    fifo: VecDeque::new(),
                    shutdown: false,
                }),
                wake: Condvar::new(),
                consumers: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                counters: DispatchCounters::new(),
                config,
            }),
            worker,
        }
    }

    /// Per-instance counters
    pub fn counters(&self) -> &DispatchCounters {
        &self.shared.counters
    }
}

impl<K, V> Dispatch<K, V> for SplitLockDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    fn variant(&self) -> Variant {
        Variant::SplitLock
    }

    #[instrument(name = "split_lock_dispatcher_start", skip(self))]
    fn start(&self) -> Result<(), DispatchError> {
        let shared = Arc::clone(&self.shared);
        let started = self.worker.start(move || {
            shared.inbox.lock().shutdown = false;
            move || worker_loop(shared)
        })?;
        if started {
            info!(capacity = self.shared.config.capacity, "Split-lock dispatcher started");
        }
        Ok(())
    }

    #[instrument(name = "split_lock_dispatcher_stop", skip(self))]
    fn stop(&self) -> Result<(), DispatchError> {
        if self.worker.stop(|| self.shared.signal_shutdown())? {
            info!(
                delivered = self.shared.counters.delivered(),
                "Split-lock dispatcher stopped"
            );
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn subscribe(&self, key: K, consumer: ConsumerRef<K, V>) -> Result<bool, DispatchError> {
        let mut consumers = self.shared.consumers.lock();
        match consumers.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Binding {
                    consumer,
                    since: self.shared.next_seq.load(Ordering::Acquire),
                });
                Ok(true)
            }
        }
    }

    fn enqueue(&self, key: K, value: V) -> bool {
        let capacity = self.shared.config.capacity;
        let mut inbox = self.shared.inbox.lock();
        if inbox.fifo.len() >= capacity {
            self.shared.counters.inc_dropped();
            trace!(capacity, "FIFO full, value dropped");
            return false;
        }
        let seq = self.shared.next_seq.fetch_add(1, Ordering::AcqRel);
        inbox.fifo.push_back(Queued { seq, key, value });
        self.shared.counters.inc_accepted();
        self.shared.wake.notify_one();
        true
    }

    fn snapshot(&self) -> DispatchSnapshot<K> {
        let mut order: Vec<K> = Vec::new();
        let mut depths: HashMap<K, usize> = HashMap::new();
        let (pending, counters) = {
            let inbox = self.shared.inbox.lock();
            for Queued { key, .. } in &inbox.fifo {
                let depth = depths.entry(key.clone()).or_insert_with(|| {
                    order.push(key.clone());
                    0
                });
                *depth += 1;
            }
            (inbox.fifo.len(), self.shared.counters.snapshot())
        };

        let consumers = self.shared.consumers.lock();
        let mut queues: Vec<QueueDepth<K>> = order
            .into_iter()
            .map(|key| QueueDepth {
                pending: depths.get(&key).copied().unwrap_or(0),
                bound: consumers.contains_key(&key),
                key,
            })
            .collect();
        queues.extend(
            consumers
                .keys()
                .filter(|key| !depths.contains_key(*key))
                .map(|key| QueueDepth {
                    key: key.clone(),
                    pending: 0,
                    bound: true,
                }),
        );

        DispatchSnapshot {
            variant: Variant::SplitLock,
            running: self.worker.is_running(),
            queues,
            pending,
            counters,
        }
    }

    fn counter_snapshot(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    fn as_unsubscribe(&self) -> Option<&dyn Unsubscribe<K, V>> {
        Some(self)
    }
}

impl<K, V> Unsubscribe<K, V> for SplitLockDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    /// Values already queued for `key` are discarded when the worker reaches
    /// them, even if `key` is bound again in the meantime.
    fn unsubscribe(&self, key: &K) -> bool {
        let removed = self.shared.consumers.lock().remove(key).is_some();
        if removed {
            debug!(key = ?key, "Unsubscribed");
        }
        removed
    }
}

impl<K, V> Drop for SplitLockDispatcher<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.worker.stop(|| self.shared.signal_shutdown()) {
            error!(error = %e, "Failed to stop split-lock dispatcher on drop");
        }
    }
}

#[instrument(
    name = "split_lock_worker_loop",
    skip(shared),
    fields(worker = %shared.config.worker_name)
)]
fn worker_loop<K, V>(shared: Arc<Shared<K, V>>)
where
    K: Eq + Hash + Debug,
{
    debug!("Split-lock worker started");

    let mut batch: VecDeque<Queued<K, V>> = VecDeque::new();
    loop {
        let shutdown = {
            let mut inbox = shared.inbox.lock();
            while !inbox.shutdown && inbox.fifo.is_empty() {
                shared.wake.wait(&mut inbox);
            }

            if inbox.shutdown && !shared.config.drain_on_stop {
                break;
            }

            debug_assert!(batch.is_empty(), "batch not drained before swap");
            if batch.is_empty() {
                mem::swap(&mut batch, &mut inbox.fifo);
            } else {
                batch.append(&mut inbox.fifo);
            }
            inbox.shutdown
        };

        let (delivered, discarded) = deliver_batch(&mut batch, &shared);
        trace!(delivered, discarded, "Delivery round complete");

        if shutdown {
            debug!(delivered, discarded, "Drained on stop");
            break;
        }
    }

    debug!("Split-lock worker stopped");
}

/// Resolve each value's consumer under the directory lock and deliver it.
///
/// Returns `(delivered, discarded)`.
fn deliver_batch<K, V>(
    batch: &mut VecDeque<Queued<K, V>>,
    shared: &Shared<K, V>,
) -> (usize, usize)
where
    K: Eq + Hash + Debug,
{
    let consumers = shared.consumers.lock();
    let mut delivered = 0;
    let mut discarded = 0;
    for Queued { seq, key, value } in batch.drain(..) {
        match consumers.get(&key) {
            Some(binding) if binding.since <= seq => {
                deliver(&*binding.consumer, &key, &value, &shared.counters);
                delivered += 1;
            }
            _ => {
                trace!(key = ?key, seq, "No consumer bound at arrival, value discarded");
                discarded += 1;
            }
        }
    }
    shared.counters.add_discarded(discarded as u64);
    (delivered, discarded)
}
