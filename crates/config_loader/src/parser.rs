//! 配置解析模块
//!
//! 以 TOML 为主，同时支持 JSON。

use contracts::{ContractError, RelayOptions};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML（推荐）
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// 根据文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 配置
pub fn parse_toml(content: &str) -> Result<RelayOptions, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 配置
pub fn parse_json(content: &str) -> Result<RelayOptions, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 按 `format` 解析
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayOptions, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeliveryMode, RetryMode, TransportKind};
    use std::time::Duration;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
transport = "rest"
delivery_mode = "broadcast"
retry_mode = "repeat"
endpoints = ["http://a:8080/hook", "http://b:8080/hook"]
retry_limit = 2
retry_timeout_ms = 1500
retry_window_ms = 800
queue_capacity = 16
"#;
        let options = parse_toml(content).unwrap();
        assert_eq!(options.transport, TransportKind::Rest);
        assert_eq!(options.delivery_mode, DeliveryMode::Broadcast);
        assert_eq!(options.retry_mode, RetryMode::Repeat);
        assert_eq!(options.endpoints.len(), 2);
        assert_eq!(options.retry_limit, 2);
        assert_eq!(options.retry_timeout, Duration::from_millis(1500));
        assert_eq!(options.retry_window, Duration::from_millis(800));
        assert_eq!(options.queue_capacity, 16);
        assert_eq!(options.result_capacity, contracts::DEFAULT_RESULT_CAPACITY);
    }

    #[test]
    fn test_parse_json_upper_case_transport() {
        let content = r#"{ "transport": "QUIC", "endpoints": ["quic://a"] }"#;
        let options = parse_json(content).unwrap();
        assert_eq!(options.transport, TransportKind::Quic);
        assert_eq!(options.delivery_mode, DeliveryMode::RoundRobin);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_mode() {
        let result = parse_toml(r#"delivery_mode = "multicast""#);
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
