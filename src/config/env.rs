//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `FACTORIO_RELAY_TWITCH_TOKEN` - Twitch OAuth token
//! - `FACTORIO_RELAY_TWITCH_CHANNEL` - Channel to join
//! - `FACTORIO_RELAY_RCON_HOST` - Factorio RCON host
//! - `FACTORIO_RELAY_RCON_PORT` - Factorio RCON port
//! - `FACTORIO_RELAY_RCON_PASSWORD` - Factorio RCON password
//! - `FACTORIO_RELAY_PLAYER` - Player receiving gifts

use std::env;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "FACTORIO_RELAY";

fn var(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like tokens and passwords to be
/// provided via environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Result<Config, ConfigError> {
    // Twitch
    if let Some(token) = var("TWITCH_TOKEN") {
        config.twitch.oauth_token = token;
    }
    if let Some(channel) = var("TWITCH_CHANNEL") {
        config.twitch.channel = channel;
    }

    // Factorio
    if let Some(host) = var("RCON_HOST") {
        config.factorio.host = host;
    }
    if let Some(port) = var("RCON_PORT") {
        config.factorio.port = port.parse().map_err(|_| ConfigError::InvalidValue {
            field: format!("{}_RCON_PORT", ENV_PREFIX),
            message: format!("'{}' is not a valid port", port),
        })?;
    }
    if let Some(password) = var("RCON_PASSWORD") {
        config.factorio.password = password;
    }
    if let Some(player) = var("PLAYER") {
        config.factorio.player = player;
    }

    Ok(config)
}

/// Check if any secret-carrying environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_TWITCH_TOKEN", ENV_PREFIX),
        format!("{}_RCON_PASSWORD", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `FACTORIO_RELAY_CONFIG`, otherwise returns "factorio-relay.conf".
pub fn get_config_path() -> String {
    var("CONFIG").unwrap_or_else(|| "factorio-relay.conf".to_string())
}
