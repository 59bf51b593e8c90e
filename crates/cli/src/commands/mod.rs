//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_relay;
pub use validate::run_validate;

use std::io;
use std::path::Path;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{ContractError, RelayOptions};

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_config(path: &Path) -> Result<RelayOptions> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ConfigFormat::from_extension)
        .ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config file: {}", path.display()))
        })?;

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CliError::config_not_found(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ConfigLoader::load_from_str(&content, format)?)
}
