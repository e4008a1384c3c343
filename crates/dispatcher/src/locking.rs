//! LockingDispatcher - one lock over the directory, delivery under the lock
//!
//! Every operation, including consumer delivery, runs while holding the
//! single directory mutex. Delivery is therefore fully serialised with
//! enqueue, subscribe and unsubscribe across all keys.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use contracts::{
    ConsumerRef, CounterSnapshot, Dispatch, DispatchError, DispatchSnapshot, DispatcherConfig,
    QueueDepth, Unsubscribe, Variant,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, instrument, trace};

use crate::delivery::deliver;
use crate::directory::{TopicDirectory, TopicEntry};
use crate::handle::WorkerSlot;
use crate::metrics::DispatchCounters;

struct State<K, V> {
    directory: TopicDirectory<K, TopicEntry<K, V>>,
    /// Set by any mutation that gives the worker something to do
    pending: bool,
    /// Set by `stop`, cleared by `start`
    shutdown: bool,
}

struct Shared<K, V> {
    state: Mutex<State<K, V>>,
    wake: Condvar,
    counters: DispatchCounters,
    config: DispatcherConfig,
}

impl<K, V> Shared<K, V> {
    fn signal_shutdown(&self) {
        self.state.lock().shutdown = true;
        self.wake.notify_one();
    }
}

/// Keyed dispatcher with a single coarse lock.
///
/// Values queued for a key without a consumer stay queued (up to capacity)
/// until a consumer binds to that key.
pub struct LockingDispatcher<K, V> {
    shared: Arc<Shared<K, V>>,
    worker: WorkerSlot,
}

impl<K, V> LockingDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    /// Create a stopped dispatcher with an empty directory
    pub fn new(config: DispatcherConfig) -> Self {
        let worker = WorkerSlot::new(config.worker_name.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    directory: TopicDirectory::new(),
                    pending: false,
                    shutdown: false,
                }),
                wake: Condvar::new(),
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

impl<K, V> Dispatch<K, V> for LockingDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    fn variant(&self) -> Variant {
        Variant::Locking
    }

    #[instrument(name = "locking_dispatcher_start", skip(self))]
    fn start(&self) -> Result<(), DispatchError> {
        let shared = Arc::clone(&self.shared);
        let started = self.worker.start(move || {
            shared.state.lock().shutdown = false;
            move || worker_loop(shared)
        })?;
        if started {
            info!(capacity = self.shared.config.capacity, "Locking dispatcher started");
        }
        Ok(())
    }

    #[instrument(name = "locking_dispatcher_stop", skip(self))]
    fn stop(&self) -> Result<(), DispatchError> {
        if self.worker.stop(|| self.shared.signal_shutdown())? {
            info!(
                delivered = self.shared.counters.delivered(),
                "Locking dispatcher stopped"
            );
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn subscribe(&self, key: K, consumer: ConsumerRef<K, V>) -> Result<bool, DispatchError> {
        let mut state = self.shared.state.lock();
        let bound = state.directory.get_or_insert(key).bind(consumer);
        if bound {
            // the key may already hold queued values
            state.pending = true;
            self.shared.wake.notify_one();
        }
        Ok(bound)
    }

    fn enqueue(&self, key: K, value: V) -> bool {
        let capacity = self.shared.config.capacity;
        let mut state = self.shared.state.lock();
        match state.directory.get_or_insert(key).try_push(value, capacity) {
            Ok(()) => {
                self.shared.counters.inc_accepted();
                state.pending = true;
                self.shared.wake.notify_one();
                true
            }
            Err(_) => {
                self.shared.counters.inc_dropped();
                trace!(capacity, "Queue full, value dropped");
                false
            }
        }
    }

    fn snapshot(&self) -> DispatchSnapshot<K> {
        let state = self.shared.state.lock();
        let queues: Vec<QueueDepth<K>> = state
            .directory
            .iter()
            .map(|(key, entry)| QueueDepth {
                key: key.clone(),
                pending: entry.queue.len(),
                bound: entry.is_bound(),
            })
            .collect();
        let pending = queues.iter().map(|q| q.pending).sum();

        DispatchSnapshot {
            variant: Variant::Locking,
            running: self.worker.is_running(),
            queues,
            pending,
            counters: self.shared.counters.snapshot(),
        }
    }

    fn counter_snapshot(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    fn as_unsubscribe(&self) -> Option<&dyn Unsubscribe<K, V>> {
        Some(self)
    }
}

impl<K, V> Unsubscribe<K, V> for LockingDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    fn unsubscribe(&self, key: &K) -> bool {
        let mut state = self.shared.state.lock();
        match state.directory.remove(key) {
            Some(entry) => {
                let discarded = entry.queue.len();
                self.shared.counters.add_discarded(discarded as u64);
                debug!(key = ?key, discarded, "Unsubscribed");
                true
            }
            None => false,
        }
    }
}

impl<K, V> Drop for LockingDispatcher<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.worker.stop(|| self.shared.signal_shutdown()) {
            error!(error = %e, "Failed to stop locking dispatcher on drop");
        }
    }
}

#[instrument(
    name = "locking_worker_loop",
    skip(shared),
    fields(worker = %shared.config.worker_name)
)]
fn worker_loop<K, V>(shared: Arc<Shared<K, V>>)
where
    K: Eq + Hash + Debug,
{
    debug!("Locking worker started");

    let mut state = shared.state.lock();
    loop {
        while !state.shutdown && !state.pending {
            shared.wake.wait(&mut state);
        }

        if state.shutdown {
            if shared.config.drain_on_stop {
                let delivered = deliver_round(&mut state.directory, &shared.counters);
                debug!(delivered, "Drained on stop");
            }
            break;
        }

        state.pending = false;
        let delivered = deliver_round(&mut state.directory, &shared.counters);
        trace!(delivered, "Delivery round complete");
    }

    debug!("Locking worker stopped");
}

/// Deliver and clear every queue that has a bound consumer.
fn deliver_round<K, V>(
    directory: &mut TopicDirectory<K, TopicEntry<K, V>>,
    counters: &DispatchCounters,
) -> usize
where
    K: Eq + Hash + Debug,
{
    let mut delivered = 0;
    for (key, entry) in directory.iter_mut() {
        let TopicEntry { consumer, queue } = entry;
        let Some(consumer) = consumer else {
            continue;
        };
        for value in queue.drain(..) {
            deliver(&**consumer, key, &value, counters);
            delivered += 1;
        }
    }
    delivered
}
