//! Producer thread - enqueues a fixed payload on one key at a fixed period.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use contracts::Dispatch;
use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// Dispatcher shared between the runner and all producer threads
pub type SharedDispatcher = Arc<dyn Dispatch<u64, Bytes>>;

#[derive(Debug, Default)]
struct ProducerCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// One producer thread
///
/// May overshoot `stop` by up to one period, since the thread only checks
/// the flag between sleeps.
pub struct Producer {
    index: usize,
    key: u64,
    period: Duration,
    running: Arc<AtomicBool>,
    counters: Arc<ProducerCounters>,
    handle: Option<JoinHandle<()>>,
}

impl Producer {
    pub fn new(index: usize, key: u64, period: Duration) -> Self {
        Self {
            index,
            key,
            period,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(ProducerCounters::default()),
            handle: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    /// Values the dispatcher accepted
    pub fn accepted(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }

    /// Values the dispatcher rejected at capacity
    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    /// Spawn the producer thread; no-op if already started
    pub fn start(&mut self, dispatcher: SharedDispatcher, payload: Bytes) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let counters = Arc::clone(&self.counters);
        let key = self.key;
        let period = self.period;
        let variant = dispatcher.variant().as_str();

        let handle = thread::Builder::new()
            .name(format!("producer-{}", self.index))
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    let accepted = dispatcher.enqueue(key, payload.clone());
                    if accepted {
                        counters.accepted.fetch_add(1, Ordering::Relaxed);
                    } else {
                        counters.rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    observability::record_enqueue(variant, accepted);
                    thread::sleep(period);
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                CliError::producer(self.index, e.to_string())
            })?;

        debug!(producer = self.index, key, "Producer started");
        self.handle = Some(handle);
        Ok(())
    }

    /// Clear the running flag and join the thread
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| CliError::producer(self.index, "thread panicked"))?;
            debug!(
                producer = self.index,
                accepted = self.accepted(),
                rejected = self.rejected(),
                "Producer stopped"
            );
        }
        Ok(())
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop producer on drop");
        }
    }
}
