//! Dispatcher metrics
//!
//! Publishes dispatcher snapshots through the `metrics` facade and keeps
//! in-memory throughput statistics for the end-of-run summary.

use contracts::{CounterSnapshot, DispatchSnapshot};
use metrics::{counter, gauge, histogram};

/// Publish a dispatcher snapshot
///
/// Counters are exported with their absolute value; queue state as gauges.
/// Builds on a full snapshot, so call it sparingly on large topologies.
pub fn record_snapshot<K>(snapshot: &DispatchSnapshot<K>) {
    let variant = snapshot.variant.as_str();
    record_counters(variant, &snapshot.counters);

    gauge!("keyed_dispatch_pending", "variant" => variant).set(snapshot.pending as f64);
    gauge!("keyed_dispatch_running", "variant" => variant).set(if snapshot.running {
        1.0
    } else {
        0.0
    });

    gauge!("keyed_dispatch_bound_keys", "variant" => variant).set(snapshot.bound_keys() as f64);

    let deepest = snapshot.queues.iter().map(|q| q.pending).max().unwrap_or(0);
    gauge!("keyed_dispatch_deepest_queue", "variant" => variant).set(deepest as f64);
}

/// Publish counter totals; lock-free counterpart of [`record_snapshot`]
pub fn record_counters(variant: &'static str, counters: &CounterSnapshot) {
    counter!("keyed_dispatch_accepted_total", "variant" => variant).absolute(counters.accepted);
    counter!("keyed_dispatch_delivered_total", "variant" => variant).absolute(counters.delivered);
    counter!("keyed_dispatch_dropped_total", "variant" => variant).absolute(counters.dropped);
    counter!("keyed_dispatch_discarded_total", "variant" => variant).absolute(counters.discarded);
    counter!("keyed_dispatch_faults_total", "variant" => variant).absolute(counters.faults);
}

/// Record one producer enqueue attempt
pub fn record_enqueue(variant: &'static str, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "keyed_dispatch_enqueue_total",
        "variant" => variant,
        "status" => status
    )
    .increment(1);
}

/// Record the wall time of a stop call
pub fn record_stop_latency_ms(variant: &'static str, latency_ms: f64) {
    histogram!("keyed_dispatch_stop_latency_ms", "variant" => variant).record(latency_ms);
}

/// Throughput aggregator
///
/// Fed with successive counter snapshots; derives per-second rates.
#[derive(Debug, Clone, Default)]
pub struct ThroughputAggregator {
    last: CounterSnapshot,
    /// Delivered messages per second
    pub delivered_rate: RunningStats,
    /// Accepted messages per second
    pub accepted_rate: RunningStats,
    /// Dropped messages per second
    pub dropped_rate: RunningStats,
}

impl ThroughputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample taken `elapsed_secs` after the previous one
    pub fn update(&mut self, counters: CounterSnapshot, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 {
            return;
        }
        let rate = |now: u64, before: u64| now.saturating_sub(before) as f64 / elapsed_secs;
        self.delivered_rate
            .push(rate(counters.delivered, self.last.delivered));
        self.accepted_rate
            .push(rate(counters.accepted, self.last.accepted));
        self.dropped_rate.push(rate(counters.dropped, self.last.dropped));
        self.last = counters;
    }

    pub fn summary(&self) -> ThroughputSummary {
        ThroughputSummary {
            totals: self.last,
            delivered_per_sec: StatsSummary::from(&self.delivered_rate),
            accepted_per_sec: StatsSummary::from(&self.accepted_rate),
            dropped_per_sec: StatsSummary::from(&self.dropped_rate),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Throughput summary
#[derive(Debug, Clone, Default)]
pub struct ThroughputSummary {
    pub totals: CounterSnapshot,
    pub delivered_per_sec: StatsSummary,
    pub accepted_per_sec: StatsSummary,
    pub dropped_per_sec: StatsSummary,
}

impl std::fmt::Display for ThroughputSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Throughput ===")?;
        writeln!(
            f,
            "Accepted: {}  Delivered: {}  Dropped: {}  Discarded: {}  Faults: {}",
            self.totals.accepted,
            self.totals.delivered,
            self.totals.dropped,
            self.totals.discarded,
            self.totals.faults
        )?;
        writeln!(f, "Delivered/s: {}", self.delivered_per_sec)?;
        writeln!(f, "Accepted/s: {}", self.accepted_per_sec)?;
        writeln!(f, "Dropped/s: {}", self.dropped_per_sec)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
