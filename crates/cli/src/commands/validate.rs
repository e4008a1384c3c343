//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BenchConfig, Variant};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    variant: Variant,
    topics: u64,
    producers: usize,
    capacity: usize,
    offered_per_sec: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    variant: config.variant,
                    topics: config.topics,
                    producers: config.producers,
                    capacity: config.dispatcher.capacity,
                    offered_per_sec: offered_rate(&config),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Enqueue attempts per second across all producers
pub(crate) fn offered_rate(config: &BenchConfig) -> f64 {
    config.producers as f64 * 1_000_000.0 / config.producer_period_us as f64
}

/// Non-fatal issues
fn collect_warnings(config: &BenchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.producers as u64 > config.topics {
        warnings.push(format!(
            "{} producers share {} topics - several producers write the same key",
            config.producers, config.topics
        ));
    }

    if config.variant == Variant::SplitLock && config.dispatcher.capacity < config.producers {
        warnings.push(
            "split-lock capacity is shared by all keys and is below the producer count"
                .to_string(),
        );
    }

    if config.variant == Variant::Prebuilt {
        warnings.push(
            "prebuilt topology is fixed at start - topics cannot be unsubscribed".to_string(),
        );
    }

    if !config.dispatcher.drain_on_stop {
        warnings.push("drain_on_stop is off - values queued at stop are not delivered".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Variant: {}", summary.variant);
            println!("  Topics: {}", summary.topics);
            println!("  Producers: {}", summary.producers);
            println!("  Capacity: {}", summary.capacity);
            println!("  Offered load: {:.0} msg/s", summary.offered_per_sec);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
