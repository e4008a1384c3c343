//! WorkerSlot - owns the background worker thread of a dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use contracts::DispatchError;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::delivery::panic_message;

/// Start/stop state of one worker thread.
///
/// The join handle is guarded by its own mutex, held for the whole of
/// `start` and `stop`, so concurrent callers are serialised: at most one
/// worker exists, and a `stop` racing a `start` either joins the new worker
/// or finds nothing to do.
#[derive(Debug)]
pub struct WorkerSlot {
    /// Worker thread name
    name: String,
    /// Fast-path view of the slot state
    running: AtomicBool,
    /// Join handle of the running worker
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerSlot {
    /// Create an empty slot
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Worker thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a worker has been spawned and not yet joined
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn a worker unless one is already running.
    ///
    /// `prepare` runs only when a new worker is about to be spawned and
    /// returns the worker body. Returns `Ok(false)` when already running.
    #[instrument(name = "worker_slot_start", skip(self, prepare), fields(worker = %self.name))]
    pub fn start<P, F>(&self, prepare: P) -> Result<bool, DispatchError>
    where
        P: FnOnce() -> F,
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.handle.lock();
        if slot.is_some() {
            debug!("Worker already running");
            return Ok(false);
        }

        let body = prepare();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(body)
            .map_err(|e| DispatchError::worker_spawn(&self.name, e))?;

        *slot = Some(handle);
        self.running.store(true, Ordering::Release);
        Ok(true)
    }

    /// Signal the worker and join it.
    ///
    /// `signal` must make the worker observe shutdown and wake it. Returns
    /// `Ok(false)` when no worker was running.
    #[instrument(name = "worker_slot_stop", skip(self, signal), fields(worker = %self.name))]
    pub fn stop<S>(&self, signal: S) -> Result<bool, DispatchError>
    where
        S: FnOnce(),
    {
        let mut slot = self.handle.lock();
        let Some(handle) = slot.take() else {
            return Ok(false);
        };

        self.running.store(false, Ordering::Release);
        signal();

        handle.join().map_err(|payload| {
            DispatchError::worker_panicked(&self.name, panic_message(payload.as_ref()))
        })?;

        debug!("Worker joined");
        Ok(true)
    }
}
