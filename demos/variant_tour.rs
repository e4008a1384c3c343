//! Variant Tour Example
//!
//! Runs the same short sequence against every dispatcher variant and prints
//! what each consumer saw: a value enqueued before its key is bound, then a
//! value enqueued after.
//!
//! Run with: cargo run -p demos --bin variant_tour [config.toml]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{DispatcherConfig, Variant};
use dispatcher::{create_dispatcher, BoxedDispatcher, RecordingConsumer};
use observability::{LogFormat, ObservabilityConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading bench config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?.dispatcher
    } else {
        DispatcherConfig::with_capacity(8)
    };

    for variant in Variant::ALL {
        tour(variant, config.clone())?;
    }

    Ok(())
}

fn tour(variant: Variant, config: DispatcherConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== {variant} ===");

    // ==== Stage 2: Enqueue before anything is bound ====
    let dispatcher: BoxedDispatcher<&'static str, String> = create_dispatcher(variant, config)?;
    dispatcher.enqueue("orders", "early".to_string());

    // ==== Stage 3: Bind, start, enqueue again ====
    let consumer = Arc::new(RecordingConsumer::<&'static str, String>::new());
    dispatcher.subscribe("orders", consumer.clone())?;
    dispatcher.start()?;
    dispatcher.enqueue("orders", "late".to_string());

    // the worker delivers asynchronously
    thread::sleep(Duration::from_millis(100));
    dispatcher.stop()?;

    println!("delivered: {:?}", consumer.values());
    let snapshot = dispatcher.snapshot();
    println!(
        "accepted={} delivered={} discarded={} pending={}",
        snapshot.counters.accepted,
        snapshot.counters.delivered,
        snapshot.counters.discarded,
        snapshot.pending
    );

    // ==== Stage 4: Tear down the topology where allowed ====
    match dispatcher.as_unsubscribe() {
        Some(topology) => println!("unsubscribed: {}", topology.unsubscribe(&"orders")),
        None => println!("unsubscribe: not supported (fixed topology)"),
    }

    Ok(())
}
