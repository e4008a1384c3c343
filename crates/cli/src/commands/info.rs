//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BenchConfig, Variant};
use serde::Serialize;
use tracing::info;

use super::validate::offered_rate;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    source: String,
    variant: VariantInfo,
    harness: HarnessInfo,
    dispatcher: DispatcherInfo,
}

#[derive(Serialize)]
struct VariantInfo {
    name: Variant,
    unsubscribe: bool,
    capacity_scope: &'static str,
    delivery: &'static str,
}

#[derive(Serialize)]
struct HarnessInfo {
    topics: u64,
    producers: usize,
    producer_period_us: u64,
    duration_secs: u64,
    payload_bytes: usize,
    offered_per_sec: f64,
}

#[derive(Serialize)]
struct DispatcherInfo {
    capacity: usize,
    drain_on_stop: bool,
    worker_name: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let (config, source) = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration info");
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            let config = config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (config, path.display().to_string())
        }
        None => (BenchConfig::default(), "defaults".to_string()),
    };

    let info = build_config_info(&config, source);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn describe(variant: Variant) -> VariantInfo {
    let (capacity_scope, delivery) = match variant {
        Variant::Locking => ("per key", "under the directory lock"),
        Variant::Prebuilt => ("per key", "outside the lock, fixed topology"),
        Variant::SplitLock => ("global", "under the subscription lock, global FIFO order"),
    };
    VariantInfo {
        name: variant,
        unsubscribe: variant.supports_unsubscribe(),
        capacity_scope,
        delivery,
    }
}

fn build_config_info(config: &BenchConfig, source: String) -> ConfigInfo {
    ConfigInfo {
        source,
        variant: describe(config.variant),
        harness: HarnessInfo {
            topics: config.topics,
            producers: config.producers,
            producer_period_us: config.producer_period_us,
            duration_secs: config.duration_secs,
            payload_bytes: config.payload_bytes,
            offered_per_sec: offered_rate(config),
        },
        dispatcher: DispatcherInfo {
            capacity: config.dispatcher.capacity,
            drain_on_stop: config.dispatcher.drain_on_stop,
            worker_name: config.dispatcher.worker_name.clone(),
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Keyed Dispatch Configuration ({}) ===\n", info.source);

    let variant = &info.variant;
    println!("Variant: {}", variant.name);
    println!("   ├─ Capacity scope: {}", variant.capacity_scope);
    println!("   ├─ Delivery: {}", variant.delivery);
    println!(
        "   └─ Unsubscribe: {}",
        if variant.unsubscribe { "yes" } else { "no" }
    );

    let harness = &info.harness;
    println!("\nHarness");
    println!("   ├─ Topics: {}", harness.topics);
    println!("   ├─ Producers: {}", harness.producers);
    println!("   ├─ Period: {} µs", harness.producer_period_us);
    println!("   ├─ Duration: {} s", harness.duration_secs);
    println!("   ├─ Payload: {} bytes", harness.payload_bytes);
    println!("   └─ Offered load: {:.0} msg/s", harness.offered_per_sec);

    let dispatcher = &info.dispatcher;
    println!("\nDispatcher");
    println!("   ├─ Capacity: {}", dispatcher.capacity);
    println!("   ├─ Drain on stop: {}", dispatcher.drain_on_stop);
    println!("   └─ Worker thread: {}", dispatcher.worker_name);

    println!();
}
