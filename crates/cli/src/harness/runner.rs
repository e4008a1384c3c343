//! Bench runner - coordinates dispatcher, consumers and producers.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{BenchConfig, ConsumerRef, Dispatch, DispatchError};
use dispatcher::{create_dispatcher, NoopConsumer};
use observability::ThroughputAggregator;
use tracing::{debug, info, warn};

use super::{BenchReport, Producer, ProducerReport, SharedDispatcher};
use crate::error::CliError;

/// Bench runner
pub struct BenchRunner {
    config: BenchConfig,
    sample_interval: Duration,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config,
            sample_interval: Duration::from_secs(1),
        }
    }

    /// Interval between two throughput samples
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Run until the configured duration elapses or `shutdown` resolves
    ///
    /// Order: bind every topic, start the dispatcher, start producers, wait,
    /// stop producers, stop the dispatcher, snapshot, then unsubscribe every
    /// topic when the variant allows it.
    pub async fn run<F>(self, shutdown: F) -> Result<BenchReport>
    where
        F: Future<Output = ()>,
    {
        let config = &self.config;
        let variant = config.variant;

        let dispatcher: SharedDispatcher = Arc::from(
            create_dispatcher::<u64, Bytes>(variant, config.dispatcher.clone())
                .context("Failed to create dispatcher")?,
        );

        let consumers = bind_topics(&*dispatcher, config.topics)
            .context("Failed to subscribe topics")?;
        info!(%variant, topics = config.topics, "Topics bound");

        dispatcher.start().context("Failed to start dispatcher")?;

        let payload = Bytes::from(vec![0u8; config.payload_bytes]);
        let period = Duration::from_micros(config.producer_period_us);
        let mut producers: Vec<Producer> = (0..config.producers)
            .map(|index| Producer::new(index, index as u64 % config.topics, period))
            .collect();
        for producer in &mut producers {
            producer.start(Arc::clone(&dispatcher), payload.clone())?;
        }

        info!(
            producers = producers.len(),
            duration_secs = config.duration_secs,
            "Running..."
        );

        let started = Instant::now();
        let mut aggregator = ThroughputAggregator::new();
        let mut last_sample = started;
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.sample_interval,
            self.sample_interval,
        );
        let deadline = tokio::time::sleep(Duration::from_secs(config.duration_secs));
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let interrupted = loop {
            tokio::select! {
                _ = &mut deadline => break false,
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping bench...");
                    break true;
                }
                _ = ticker.tick() => {
                    let counters = dispatcher.counter_snapshot();
                    let now = Instant::now();
                    aggregator.update(counters, now.duration_since(last_sample).as_secs_f64());
                    last_sample = now;
                    observability::record_counters(variant.as_str(), &counters);
                    debug!(
                        accepted = counters.accepted,
                        delivered = counters.delivered,
                        dropped = counters.dropped,
                        "Sample"
                    );
                }
            }
        };

        info!("Stopping...");
        let producers = tokio::task::spawn_blocking(move || {
            for producer in &mut producers {
                producer.stop()?;
            }
            Ok::<_, CliError>(producers)
        })
        .await
        .context("Producer stop task failed")?
        .context("Failed to stop producers")?;

        let stop_started = Instant::now();
        let stopping = Arc::clone(&dispatcher);
        tokio::task::spawn_blocking(move || stopping.stop())
            .await
            .context("Dispatcher stop task failed")?
            .context("Failed to stop dispatcher")?;
        observability::record_stop_latency_ms(
            variant.as_str(),
            stop_started.elapsed().as_secs_f64() * 1000.0,
        );
        let elapsed = started.elapsed();

        let final_counters = dispatcher.counter_snapshot();
        aggregator.update(final_counters, last_sample.elapsed().as_secs_f64());

        let snapshot = dispatcher.snapshot();
        observability::record_snapshot(&snapshot);

        let unsubscribed = dispatcher.as_unsubscribe().map(|topology| {
            (0..config.topics)
                .filter(|key| topology.unsubscribe(key))
                .count() as u64
        });

        let report = BenchReport {
            variant,
            topics: config.topics,
            elapsed,
            interrupted,
            producers: producers
                .iter()
                .map(|p| ProducerReport {
                    index: p.index(),
                    key: p.key(),
                    accepted: p.accepted(),
                    rejected: p.rejected(),
                })
                .collect(),
            consumed: consumers.iter().map(|c| c.consumed()).sum(),
            unsubscribed,
            snapshot,
            throughput: aggregator.summary(),
        };

        info!(
            delivered = report.snapshot.counters.delivered,
            dropped = report.snapshot.counters.dropped,
            elapsed_secs = elapsed.as_secs_f64(),
            "Bench finished"
        );
        Ok(report)
    }
}

/// Bind a fresh `NoopConsumer` to every key in `0..topics`
fn bind_topics(
    dispatcher: &dyn Dispatch<u64, Bytes>,
    topics: u64,
) -> Result<Vec<Arc<NoopConsumer>>, DispatchError> {
    let mut consumers = Vec::with_capacity(usize::try_from(topics).unwrap_or(0));
    for key in 0..topics {
        let consumer = Arc::new(NoopConsumer::new());
        let binding: ConsumerRef<u64, Bytes> = consumer.clone();
        dispatcher.subscribe(key, binding)?;
        consumers.push(consumer);
    }
    Ok(consumers)
}
