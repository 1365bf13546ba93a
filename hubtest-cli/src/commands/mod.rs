//! Command handlers -- one module per subcommand

use std::path::Path;

use hubtest_core::config::HubtestConfig;
use hubtest_core::error::{ConfigError, HubtestError};

use crate::error::CliError;

pub mod config;
pub mod env;
pub mod run;

/// Load the config file and apply environment overrides, without validating.
///
/// A missing file is only tolerated when the path was not named explicitly.
/// Callers validate once every override (including flags) is folded in.
pub async fn load_config(path: &Path, explicit: bool) -> Result<HubtestConfig, CliError> {
    let mut config = match HubtestConfig::from_file(path).await {
        Ok(config) => config,
        Err(HubtestError::Config(ConfigError::FileNotFound { .. })) if !explicit => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            HubtestConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Load and validate the configuration for commands that take no flag overrides.
pub async fn load_validated(path: &Path, explicit: bool) -> Result<HubtestConfig, CliError> {
    let config = if explicit {
        HubtestConfig::load(path).await?
    } else {
        HubtestConfig::load_or_default(path).await?
    };
    Ok(config)
}
