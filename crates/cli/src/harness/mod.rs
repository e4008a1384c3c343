//! Load harness: producers, no-op consumers, timed run.

mod producer;
mod report;
mod runner;

pub use producer::{Producer, SharedDispatcher};
pub use report::{BenchReport, ProducerReport};
pub use runner::BenchRunner;
