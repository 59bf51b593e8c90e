//! 配置校验模块
//!
//! 校验规则（在填充默认值之后执行）：
//! - endpoint 非空且唯一
//! - REST endpoint 必须是 `http://` 或 `https://` URL
//! - `retry_limit` 不超过 [`MAX_RETRY_LIMIT`]

use std::collections::HashSet;

use contracts::{ContractError, RelayOptions, TransportKind};

/// 单个窗口内允许的最大失败容忍次数
pub const MAX_RETRY_LIMIT: usize = 10_000;

/// 校验配置，返回遇到的第一个错误
pub fn validate(options: &RelayOptions) -> Result<(), ContractError> {
    validate_endpoint_ids(options)?;
    validate_endpoint_schemes(options)?;
    validate_retry_limit(options)?;
    Ok(())
}

fn validate_retry_limit(options: &RelayOptions) -> Result<(), ContractError> {
    if options.retry_limit > MAX_RETRY_LIMIT {
        return Err(ContractError::config_validation(
            "retry_limit",
            format!(
                "retry_limit {} exceeds maximum {MAX_RETRY_LIMIT}",
                options.retry_limit
            ),
        ));
    }
    Ok(())
}

fn validate_endpoint_ids(options: &RelayOptions) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, endpoint) in options.endpoints.iter().enumerate() {
        if endpoint.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("endpoints[{idx}]"),
                "endpoint cannot be empty",
            ));
        }
        if !seen.insert(endpoint.as_str()) {
            return Err(ContractError::config_validation(
                format!("endpoints[{idx}]"),
                format!("duplicate endpoint '{endpoint}'"),
            ));
        }
    }
    Ok(())
}

fn validate_endpoint_schemes(options: &RelayOptions) -> Result<(), ContractError> {
    if options.transport != TransportKind::Rest {
        return Ok(());
    }
    for (idx, endpoint) in options.endpoints.iter().enumerate() {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ContractError::config_validation(
                format!("endpoints[{idx}]"),
                format!("REST endpoint must be an http(s) URL, got '{endpoint}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let options = RelayOptions::with_endpoints(["http://a", "https://b"]);
        assert!(validate(&options).is_ok());
    }

    #[test]
    fn test_empty_endpoint_set_is_valid() {
        assert!(validate(&RelayOptions::default()).is_ok());
    }

    #[test]
    fn test_duplicate_endpoint() {
        let options = RelayOptions::with_endpoints(["http://a", "http://a"]);
        let err = validate(&options).unwrap_err().to_string();
        assert!(err.contains("duplicate endpoint"), "got: {err}");
        assert!(err.contains("endpoints[1]"), "got: {err}");
    }

    #[test]
    fn test_blank_endpoint() {
        let options = RelayOptions::with_endpoints(["http://a", "  "]);
        let err = validate(&options).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_rest_requires_http_scheme() {
        let options = RelayOptions::with_endpoints(["localhost:8080"]);
        let err = validate(&options).unwrap_err().to_string();
        assert!(err.contains("http(s) URL"), "got: {err}");
    }

    #[test]
    fn test_retry_limit_upper_bound() {
        let at_max = RelayOptions {
            retry_limit: MAX_RETRY_LIMIT,
            ..RelayOptions::with_endpoints(["http://a"])
        };
        assert!(validate(&at_max).is_ok());

        let err = validate(&RelayOptions {
            retry_limit: MAX_RETRY_LIMIT + 1,
            ..at_max
        })
        .unwrap_err()
        .to_string();
        assert!(err.contains("retry_limit"), "got: {err}");
        assert!(err.contains("exceeds maximum"), "got: {err}");
    }

    #[test]
    fn test_quic_skips_scheme_check() {
        let options = RelayOptions {
            transport: TransportKind::Quic,
            ..RelayOptions::with_endpoints(["10.0.0.1:4433"])
        };
        assert!(validate(&options).is_ok());
    }
}
