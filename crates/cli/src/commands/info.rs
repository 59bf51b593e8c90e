//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::RelayOptions;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    transport: String,
    delivery_mode: String,
    retry_mode: String,
    endpoints: Vec<String>,
    breaker: BreakerInfo,
    queue_capacity: usize,
    result_capacity: usize,
}

#[derive(Serialize)]
struct BreakerInfo {
    retry_limit: usize,
    retry_window_ms: u64,
    retry_timeout_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let options = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&options);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&options);
    }

    Ok(())
}

fn build_config_info(options: &RelayOptions) -> ConfigInfo {
    ConfigInfo {
        transport: options.transport.to_string(),
        delivery_mode: format!("{:?}", options.delivery_mode),
        retry_mode: format!("{:?}", options.retry_mode),
        endpoints: options.endpoints.clone(),
        breaker: BreakerInfo {
            retry_limit: options.retry_limit,
            retry_window_ms: options.retry_window.as_millis() as u64,
            retry_timeout_ms: options.retry_timeout.as_millis() as u64,
        },
        queue_capacity: options.queue_capacity,
        result_capacity: options.result_capacity,
    }
}

fn print_config_info(options: &RelayOptions) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Relay Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Delivery");
    println!("   ├─ Transport: {}", options.transport);
    println!("   ├─ Mode: {:?}", options.delivery_mode);
    println!("   └─ Retry mode: {:?}", options.retry_mode);

    println!("\n🎯 Endpoints ({})", options.endpoints.len());
    for (i, endpoint) in options.endpoints.iter().enumerate() {
        let prefix = if i == options.endpoints.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!("   {} {}", prefix, endpoint);
    }

    println!("\n⚙️  Circuit Breaker");
    println!(
        "   ├─ Trips after: {} failures within {} ms",
        options.retry_limit + 1,
        options.retry_window.as_millis()
    );
    println!("   └─ Blocks for: {} ms", options.retry_timeout.as_millis());

    println!("\n📦 Queues");
    println!("   ├─ Per endpoint: {}", options.queue_capacity);
    println!("   └─ Results: {}", options.result_capacity);

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_info() {
        let options = RelayOptions::with_endpoints(["http://a"]);
        let info = build_config_info(&options);
        assert_eq!(info.transport, "REST");
        assert_eq!(info.delivery_mode, "RoundRobin");
        assert_eq!(info.breaker.retry_window_ms, 3000);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["endpoints"][0], "http://a");
    }
}
