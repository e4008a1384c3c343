//! # Contracts
//!
//! Frozen interface contracts shared by every dispatcher variant and by the
//! harness crates. Business crates depend on this crate only; it depends on
//! none of them.
//!
//! ## Delivery model
//! - Producers push `(key, value)` pairs through [`Dispatch::enqueue`]
//! - A single background worker per dispatcher hands each value to the
//!   [`Consumer`] bound to its key
//! - Admission is a bounded, non-blocking accept/reject

mod config;
mod consumer;
mod dispatch;
mod error;
mod snapshot;
mod variant;

pub use config::*;
pub use consumer::*;
pub use dispatch::*;
pub use error::*;
pub use snapshot::*;
pub use variant::Variant;
