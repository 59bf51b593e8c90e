//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{RelayOptions, TransportKind};

use super::load_config;
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
    transport: String,
    delivery_mode: String,
    endpoint_count: usize,
    retry_limit: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
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

    match load_config(&args.config) {
        Ok(options) => {
            let warnings = collect_warnings(&options);
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
                    transport: options.transport.to_string(),
                    delivery_mode: format!("{:?}", options.delivery_mode),
                    endpoint_count: options.endpoints.len(),
                    retry_limit: options.retry_limit,
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

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(options: &RelayOptions) -> Vec<String> {
    let mut warnings = Vec::new();

    if options.endpoints.is_empty() {
        warnings.push("No endpoints configured - every emit will be rejected".to_string());
    }

    if options.transport == TransportKind::Quic {
        warnings.push("QUIC transport is not implemented - every delivery will fail".to_string());
    }

    if options.retry_timeout < options.retry_window {
        warnings.push(format!(
            "retry_timeout_ms ({}) is shorter than retry_window_ms ({}) - \
             a recovered endpoint may trip again on stale failures",
            options.retry_timeout.as_millis(),
            options.retry_window.as_millis()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Transport: {}", summary.transport);
            println!("  Delivery mode: {}", summary.delivery_mode);
            println!("  Endpoints: {}", summary.endpoint_count);
            println!("  Retry limit: {}", summary.retry_limit);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_warnings() {
        let options = RelayOptions {
            transport: TransportKind::Quic,
            retry_timeout: Duration::from_secs(1),
            retry_window: Duration::from_secs(3),
            ..RelayOptions::default()
        };
        let warnings = collect_warnings(&options);
        assert_eq!(warnings.len(), 3);
        assert!(collect_warnings(&RelayOptions::with_endpoints(["http://a"])).is_empty());
    }
}
