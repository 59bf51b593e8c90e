//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::RelayOptions;

use super::load_config;
use crate::cli::RunArgs;
use crate::error::{self, CliError};
use crate::pipeline::{PayloadSource, Relay, RelayConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let options = build_options(args).context("Invalid relay configuration")?;

    info!(
        transport = %options.transport,
        mode = ?options.delivery_mode,
        endpoints = options.endpoints.len(),
        retry_limit = options.retry_limit,
        retry_window_ms = options.retry_window.as_millis() as u64,
        retry_timeout_ms = options.retry_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&options);
        return Ok(());
    }

    let relay_config = RelayConfig {
        options,
        source: if args.stdin {
            PayloadSource::Stdin
        } else {
            PayloadSource::Counter {
                interval: Duration::from_millis(args.interval_ms.max(1)),
            }
        },
        max_payloads: if args.count == 0 {
            None
        } else {
            Some(args.count)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting relay...");
    let stats = Relay::new(relay_config)
        .run(setup_shutdown_signal())
        .await
        .context("Relay execution failed")?;

    info!(
        emitted = stats.delivery.emitted,
        rejected = stats.delivery.rejected,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Relay completed"
    );
    stats.print_summary();

    Ok(())
}

/// Merge the config file (if any) with command-line overrides
fn build_options(args: &RunArgs) -> error::Result<RelayOptions> {
    let mut options = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => RelayOptions::default(),
    };

    for endpoint in &args.endpoints {
        if !options.endpoints.contains(endpoint) {
            options.endpoints.push(endpoint.clone());
        }
    }
    if let Some(mode) = args.delivery_mode {
        info!(mode = ?mode, "Overriding delivery mode from CLI");
        options.delivery_mode = mode.into();
    }
    if let Some(limit) = args.retry_limit {
        info!(limit, "Overriding retry limit from CLI");
        options.retry_limit = limit;
    }

    let options = ConfigLoader::validate(options)?;
    if options.endpoints.is_empty() {
        return Err(CliError::NoEndpoints);
    }
    Ok(options)
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(options: &RelayOptions) {
    println!("\n=== Configuration Summary ===\n");
    println!("Transport: {}", options.transport);
    println!("Delivery mode: {:?}", options.delivery_mode);
    println!("Retry mode: {:?}", options.retry_mode);
    println!("\nEndpoints ({}):", options.endpoints.len());
    for endpoint in &options.endpoints {
        println!("  - {}", endpoint);
    }
    println!(
        "\nBreaker: {} failures / {} ms window, {} ms block",
        options.retry_limit,
        options.retry_window.as_millis(),
        options.retry_timeout.as_millis()
    );
    println!();
}
