//! Bench run report.

use std::time::Duration;

use contracts::{DispatchSnapshot, Variant};
use observability::ThroughputSummary;
use serde::Serialize;

/// Per-producer totals
#[derive(Debug, Clone, Serialize)]
pub struct ProducerReport {
    pub index: usize,
    pub key: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Outcome of one bench run
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub variant: Variant,
    pub topics: u64,
    /// Wall time from dispatcher start to dispatcher stop
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Ended by a shutdown signal instead of the configured duration
    pub interrupted: bool,
    pub producers: Vec<ProducerReport>,
    /// Sum of calls seen by all consumers
    pub consumed: u64,
    /// Bindings removed after the dump; None for fixed-topology variants
    pub unsubscribed: Option<u64>,
    /// Final dispatcher state, taken after stop
    pub snapshot: DispatchSnapshot<u64>,
    #[serde(skip)]
    pub throughput: ThroughputSummary,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl BenchReport {
    /// Delivered values per second over the whole run
    pub fn delivered_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.snapshot.counters.delivered as f64 / secs
        } else {
            0.0
        }
    }

    /// Keep only non-empty queues, sorted by key
    pub fn retain_pending_queues(&mut self) {
        self.snapshot.queues.retain(|q| q.pending > 0);
        self.sort_queues();
    }

    pub fn sort_queues(&mut self) {
        self.snapshot.queues.sort_by_key(|q| q.key);
    }

    /// Print the queue dump and totals
    pub fn print_summary(&self) {
        println!("\n=== Bench: {} ===\n", self.variant);
        println!("Duration: {:.2}s", self.elapsed.as_secs_f64());
        if self.interrupted {
            println!("Interrupted by shutdown signal");
        }
        println!("Topics: {}", self.topics);
        println!("Producers: {}", self.producers.len());

        println!("\nid\tqueue size\tbound");
        for queue in &self.snapshot.queues {
            println!("{}\t{}\t{}", queue.key, queue.pending, queue.bound);
        }

        let counters = &self.snapshot.counters;
        println!("\nmsg accepted: {}", counters.accepted);
        println!("msg processed: {}", counters.delivered);
        println!("msg dropped: {}", counters.dropped);
        println!("msg discarded: {}", counters.discarded);
        println!("consumer faults: {}", counters.faults);
        println!("msg pending: {}", self.snapshot.pending);
        println!("consumed: {}", self.consumed);
        println!("delivered/s: {:.1}", self.delivered_per_sec());
        if let Some(unsubscribed) = self.unsubscribed {
            println!("unsubscribed: {unsubscribed}");
        }

        println!("\n{}", self.throughput);
    }
}
