//! Configuration validation
//!
//! Field rules come from the `validator` derives on the config types.
//! Cross-field rules:
//! - payload_bytes <= MAX_PAYLOAD_BYTES
//! - producer_period_us shorter than the run duration
//! - split-lock capacity below the producer count is legal but warned about

use std::borrow::Cow;

use contracts::{BenchConfig, ConfigError, Variant};
use tracing::warn;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Largest accepted payload (1 MiB)
pub const MAX_PAYLOAD_BYTES: usize = 1 << 20;

/// Validate a `BenchConfig`
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &BenchConfig) -> Result<(), ConfigError> {
    validate_fields(config)?;
    validate_payload(config)?;
    validate_timing(config)?;
    check_shared_capacity(config);
    Ok(())
}

fn validate_fields(config: &BenchConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, "")
            .unwrap_or_else(|| (String::from("config"), errors.to_string()));
        ConfigError::validation(field, message)
    })
}

/// First failing field in key order, with a dotted path for nested structs
fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<(&Cow<'static, str>, &ValidationErrorsKind)> =
        errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields.into_iter().find_map(|(field, kind)| {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                Some((path, message))
            }
            ValidationErrorsKind::Struct(nested) => first_error(nested, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, nested)| first_error(nested, &format!("{path}[{idx}]"))),
        }
    })
}

fn validate_payload(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.payload_bytes > MAX_PAYLOAD_BYTES {
        return Err(ConfigError::validation(
            "payload_bytes",
            format!(
                "payload_bytes must be <= {MAX_PAYLOAD_BYTES}, got {}",
                config.payload_bytes
            ),
        ));
    }
    Ok(())
}

fn validate_timing(config: &BenchConfig) -> Result<(), ConfigError> {
    let run_us = config.duration_secs.saturating_mul(1_000_000);
    if config.producer_period_us >= run_us {
        return Err(ConfigError::validation(
            "producer_period_us / duration_secs",
            format!(
                "producer_period_us ({}) must be shorter than the run ({} s)",
                config.producer_period_us, config.duration_secs
            ),
        ));
    }
    Ok(())
}

/// Split-lock bounds all keys with one FIFO; a bound below the producer
/// count rejects most traffic as soon as the worker falls behind.
fn check_shared_capacity(config: &BenchConfig) {
    if config.variant == Variant::SplitLock && config.dispatcher.capacity < config.producers {
        warn!(
            capacity = config.dispatcher.capacity,
            producers = config.producers,
            "Split-lock capacity is shared by all keys and is smaller than the producer count"
        );
    }
}
