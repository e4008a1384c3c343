//! PrebuiltDispatcher - fixed topology, per-key double buffering
//!
//! All consumers are subscribed before `start`. Each wake runs two phases:
//! 1. Under the directory lock, swap every bound key's inbound queue into a
//!    worker-owned delivery buffer
//! 2. With no lock held, deliver every delivery buffer
//!
//! Producers are only blocked for the swap, never for consumer calls.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;

use contracts::{
    ConsumerRef, CounterSnapshot, Dispatch, DispatchError, DispatchSnapshot, DispatcherConfig,
    QueueDepth, Variant,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, instrument, trace};

use crate::delivery::deliver;
use crate::directory::{TopicDirectory, TopicEntry};
use crate::handle::WorkerSlot;
use crate::metrics::DispatchCounters;

struct State<K, V> {
    directory: TopicDirectory<K, TopicEntry<K, V>>,
    /// Set by enqueue and by a new binding
    pending: bool,
    /// Set by `stop`, cleared by `start`
    shutdown: bool,
    /// Topology is fixed from `start` until `stop` returns
    frozen: bool,
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

    fn unfreeze(&self) {
        self.state.lock().frozen = false;
    }
}

/// Worker-owned delivery buffer of one bound key
struct Lane<K, V> {
    key: K,
    consumer: ConsumerRef<K, V>,
    buffer: VecDeque<V>,
}

impl<K, V> Lane<K, V>
where
    K: Debug,
{
    /// Move every value of `inbound` into the delivery buffer.
    ///
    /// The buffer is drained by the previous round before the next swap; if
    /// it is not, the new values are appended so per-key order still holds.
    fn take_from(&mut self, inbound: &mut VecDeque<V>) {
        debug_assert!(
            self.buffer.is_empty(),
            "delivery buffer of {:?} not drained before swap",
            self.key
        );
        if self.buffer.is_empty() {
            mem::swap(&mut self.buffer, inbound);
        } else {
            self.buffer.append(inbound);
        }
    }

    fn deliver_all(&mut self, counters: &DispatchCounters) -> usize {
        let count = self.buffer.len();
        for value in self.buffer.drain(..) {
            deliver(&*self.consumer, &self.key, &value, counters);
        }
        count
    }
}

/// Keyed dispatcher with a topology fixed at start.
///
/// Subscribing while running fails with [`DispatchError::TopologyFrozen`];
/// there is no unsubscribe. Values enqueued for a key that has no consumer
/// are held (up to capacity) and picked up by the next `start` after that
/// key is subscribed.
pub struct PrebuiltDispatcher<K, V> {
    shared: Arc<Shared<K, V>>,
    worker: WorkerSlot,
}

impl<K, V> PrebuiltDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    /// Create a stopped dispatcher with an empty topology
    pub fn new(config: DispatcherConfig) -> Self {
        let worker = WorkerSlot::new(config.worker_name.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    directory: TopicDirectory::new(),
                    pending: false,
                    shutdown: false,
                    frozen: false,
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

    /// Freeze the topology and build one lane per bound key
    fn freeze(shared: &Shared<K, V>) -> Vec<Lane<K, V>> {
        let mut state = shared.state.lock();
        state.shutdown = false;
        state.frozen = true;
        // values queued before start must be picked up by the first round
        state.pending = true;

        state
            .directory
            .iter()
            .filter_map(|(key, entry)| {
                entry.consumer.as_ref().map(|consumer| Lane {
                    key: key.clone(),
                    consumer: Arc::clone(consumer),
                    // storage arrives with the first swap
                    buffer: VecDeque::new(),
                })
            })
            .collect()
    }
}

impl<K, V> Dispatch<K, V> for PrebuiltDispatcher<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    fn variant(&self) -> Variant {
        Variant::Prebuilt
    }

    #[instrument(name = "prebuilt_dispatcher_start", skip(self))]
    fn start(&self) -> Result<(), DispatchError> {
        let shared = Arc::clone(&self.shared);
        let mut lanes_count = 0;
        let started = self
            .worker
            .start(|| {
                let lanes = Self::freeze(&shared);
                lanes_count = lanes.len();
                move || worker_loop(shared, lanes)
            })
            .inspect_err(|_| self.shared.unfreeze())?;

        if started {
            info!(
                lanes = lanes_count,
                capacity = self.shared.config.capacity,
                "Prebuilt dispatcher started"
            );
        }
        Ok(())
    }

    #[instrument(name = "prebuilt_dispatcher_stop", skip(self))]
    fn stop(&self) -> Result<(), DispatchError> {
        let stopped = self
            .worker
            .stop(|| self.shared.signal_shutdown())
            // a panicked worker never reopened the topology
            .inspect_err(|_| self.shared.unfreeze())?;
        if stopped {
            info!(
                delivered = self.shared.counters.delivered(),
                "Prebuilt dispatcher stopped"
            );
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn subscribe(&self, key: K, consumer: ConsumerRef<K, V>) -> Result<bool, DispatchError> {
        let mut state = self.shared.state.lock();
        if state.frozen {
            return Err(DispatchError::topology_frozen(format!("{key:?}")));
        }
        let bound = state.directory.get_or_insert(key).bind(consumer);
        if bound {
            state.pending = true;
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
            variant: Variant::Prebuilt,
            running: self.worker.is_running(),
            queues,
            pending,
            counters: self.shared.counters.snapshot(),
        }
    }

    fn counter_snapshot(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }
}

impl<K, V> Drop for PrebuiltDispatcher<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.worker.stop(|| self.shared.signal_shutdown()) {
            error!(error = %e, "Failed to stop prebuilt dispatcher on drop");
        }
    }
}

#[instrument(
    name = "prebuilt_worker_loop",
    skip(shared, lanes),
    fields(worker = %shared.config.worker_name, lanes = lanes.len())
)]
fn worker_loop<K, V>(shared: Arc<Shared<K, V>>, mut lanes: Vec<Lane<K, V>>)
where
    K: Eq + Hash + Debug,
{
    debug!("Prebuilt worker started");

    loop {
        let shutdown = {
            let mut state = shared.state.lock();
            while !state.shutdown && !state.pending {
                shared.wake.wait(&mut state);
            }

            if state.shutdown && !shared.config.drain_on_stop {
                break;
            }

            state.pending = false;
            for lane in lanes.iter_mut() {
                // entries are never removed, so every lane key is present
                if let Some(entry) = state.directory.get_mut(&lane.key) {
                    lane.take_from(&mut entry.queue);
                }
            }
            state.shutdown
        };

        let delivered: usize = lanes
            .iter_mut()
            .map(|lane| lane.deliver_all(&shared.counters))
            .sum();
        trace!(delivered, "Delivery round complete");

        if shutdown {
            debug!(delivered, "Drained on stop");
            break;
        }
    }

    shared.state.lock().frozen = false;
    debug!("Prebuilt worker stopped");
}
