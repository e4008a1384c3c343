//! Command implementations.

mod bench;
mod info;
mod validate;

use std::path::Path;

use contracts::BenchConfig;

use crate::cli::BenchArgs;
use crate::error::{CliError, Result};

pub use bench::run_bench;
pub use info::run_info;
pub use validate::run_validate;

/// Load the config file, or defaults without one, then apply CLI overrides
pub fn resolve_bench_config(path: Option<&Path>, args: &BenchArgs) -> Result<BenchConfig> {
    let mut config = match path {
        Some(path) if !path.exists() => {
            return Err(CliError::config_not_found(path.display().to_string()))
        }
        Some(path) => config_loader::ConfigLoader::load_from_path(path)?,
        None => BenchConfig::default(),
    };

    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(topics) = args.topics {
        config.topics = topics;
    }
    if let Some(producers) = args.producers {
        config.producers = producers;
    }
    if let Some(period_us) = args.period_us {
        config.producer_period_us = period_us;
    }
    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    if let Some(capacity) = args.capacity {
        config.dispatcher.capacity = capacity;
    }
    if let Some(payload_bytes) = args.payload_bytes {
        config.payload_bytes = payload_bytes;
    }
    if args.drain_on_stop {
        config.dispatcher.drain_on_stop = true;
    }

    config_loader::ConfigLoader::validate(&config)?;
    Ok(config)
}
