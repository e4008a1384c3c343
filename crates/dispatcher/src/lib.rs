//! # Dispatcher
//!
//! In-process keyed publish/subscribe dispatchers.
//!
//! Three interchangeable designs implement [`contracts::Dispatch`]:
//! - [`LockingDispatcher`]: one lock, delivery under the lock
//! - [`PrebuiltDispatcher`]: fixed topology, per-key double buffering
//! - [`SplitLockDispatcher`]: separate FIFO and subscription locks
//!
//! Each instance owns exactly one worker thread while running.

pub mod consumers;
mod delivery;
pub mod directory;
pub mod dispatcher;
pub mod handle;
pub mod locking;
pub mod metrics;
pub mod prebuilt;
pub mod split_lock;

#[cfg(test)]
mod test_util;

pub use contracts::{
    Consumer, ConsumerRef, Dispatch, DispatchError, DispatchSnapshot, DispatcherConfig,
    Unsubscribe, Variant,
};
pub use consumers::{NoopConsumer, RecordingConsumer};
pub use dispatcher::{create_dispatcher, validate_config, BoxedDispatcher};
pub use handle::WorkerSlot;
pub use locking::LockingDispatcher;
pub use metrics::DispatchCounters;
pub use prebuilt::PrebuiltDispatcher;
pub use split_lock::SplitLockDispatcher;
