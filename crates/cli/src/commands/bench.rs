//! `bench` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use super::resolve_bench_config;
use crate::cli::BenchArgs;
use crate::harness::BenchRunner;

/// Execute the `bench` command
pub async fn run_bench(args: &BenchArgs) -> Result<()> {
    let config = resolve_bench_config(args.config.as_deref(), args)
        .context("Failed to resolve bench configuration")?;

    info!(
        variant = %config.variant,
        topics = config.topics,
        producers = config.producers,
        period_us = config.producer_period_us,
        duration_secs = config.duration_secs,
        capacity = config.dispatcher.capacity,
        drain_on_stop = config.dispatcher.drain_on_stop,
        "Configuration resolved"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let mut report = BenchRunner::new(config)
        .run(shutdown_signal())
        .await
        .context("Bench run failed")?;

    if args.all_queues {
        report.sort_queues();
    } else {
        report.retain_pending_queues();
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize bench report")?;
        println!("{json}");
    } else {
        report.print_summary();
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed, that source never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
