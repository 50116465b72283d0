//! Configuration parsing, overrides and validation.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use tracing::warn;

use crate::common::error::ConfigError;

pub use parser::load_config;
pub use types::*;
pub use validate::validate_config;

/// Load the config file, apply environment overrides and validate the result.
///
/// Any error here is fatal: the relay must not start half-configured.
pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    for var in env::check_empty_env_vars() {
        warn!("{} is set but empty", var);
    }

    let config = env::apply_env_overrides(load_config(path)?)?;
    validate_config(&config)?;
    Ok(config)
}
