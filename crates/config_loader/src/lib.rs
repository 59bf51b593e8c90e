//! # Config Loader
//!
//! Loading and parsing of relay options.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Fill unset fields with their defaults
//! - Validate the result
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let options = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("Endpoints: {:?}", options.endpoints);
//! ```

mod parser;
mod validator;

pub use contracts::RelayOptions;
pub use parser::ConfigFormat;
pub use validator::MAX_RETRY_LIMIT;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayOptions, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RelayOptions, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate options built in code (defaults applied first)
    pub fn validate(options: RelayOptions) -> Result<RelayOptions, ContractError> {
        let options = options.with_defaults();
        validator::validate(&options)?;
        Ok(options)
    }

    /// Serialize options to TOML string
    pub fn to_toml(options: &RelayOptions) -> Result<String, ContractError> {
        toml::to_string_pretty(options)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize options to JSON string
    pub fn to_json(options: &RelayOptions) -> Result<String, ContractError> {
        serde_json::to_string_pretty(options)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, default and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<RelayOptions, ContractError> {
        let options = parser::parse(content, format)?;
        Self::validate(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const MINIMAL_TOML: &str = r#"
endpoints = ["http://127.0.0.1:8080/hook", "http://127.0.0.1:8081/hook"]
retry_limit = 3
retry_window_ms = 0
"#;

    #[test]
    fn test_load_from_str_applies_defaults() {
        let options = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(options.endpoints.len(), 2);
        assert_eq!(options.retry_limit, 3);
        assert_eq!(options.retry_window, Duration::from_secs(3));
        assert_eq!(options.retry_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_round_trip_toml() {
        let options = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&options).unwrap();
        let reloaded = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(options, reloaded);
    }

    #[test]
    fn test_round_trip_json() {
        let options = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&options).unwrap();
        assert!(json.contains("\"retry_timeout_ms\": 5000"), "got: {json}");
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(options, reloaded);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"endpoints = ["http://a", "http://a"]"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_extreme_retry_limit_rejected() {
        let content = format!(r#"{{ "endpoints": ["http://a"], "retry_limit": {} }}"#, usize::MAX);
        let err = ConfigLoader::load_from_str(&content, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }), "got: {err}");
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "endpoints": ["https://a/hook"], "delivery_mode": "broadcast" }}"#).unwrap();

        let options = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(options.endpoints, vec!["https://a/hook"]);
        assert_eq!(options.delivery_mode, contracts::DeliveryMode::Broadcast);
    }

    #[test]
    fn test_load_from_path_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_load_from_missing_path_is_io_error() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
