//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.
//! The relay refuses to start while any of these fail.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::common::types::UnrecognizedPolicy;
use crate::config::types::Config;

/// Values shipped in the example config that must be replaced.
const PLACEHOLDERS: &[&str] = &[
    "YOUR_OAUTH_TOKEN_HERE",
    "YOUR_CHANNEL_HERE",
    "YOUR_RCON_PASSWORD_HERE",
    "YOUR_PLAYER_NAME_HERE",
];

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let required = [
        ("twitch.oauth_token", &config.twitch.oauth_token),
        ("twitch.channel", &config.twitch.channel),
        ("factorio.password", &config.factorio.password),
        ("factorio.player", &config.factorio.player),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("{} is required", field));
        } else if PLACEHOLDERS.contains(&value.as_str()) {
            errors.push(format!(
                "{} has not been configured (still using placeholder)",
                field
            ));
        }
    }

    // Twitch config
    if config.twitch.host.is_empty() {
        errors.push("twitch.host must not be empty".to_string());
    }
    if config.twitch.port == 0 {
        errors.push("twitch.port must be non-zero".to_string());
    }

    // Factorio config
    if config.factorio.host.is_empty() {
        errors.push("factorio.host must not be empty".to_string());
    }
    if config.factorio.port == 0 {
        errors.push("factorio.port must be non-zero".to_string());
    }
    if config.factorio.timeout_secs == 0 {
        errors.push("factorio.timeout_secs must be non-zero".to_string());
    }
    // Interpolated into the give-item directive as-is
    if config
        .factorio
        .player
        .chars()
        .any(|c| c == '"' || c == '\\' || c.is_control())
    {
        errors.push("factorio.player must not contain quotes, backslashes or control characters".to_string());
    }

    // Gifts
    if config.gifts.iron_plate_count == 0 {
        errors.push("gifts.iron_plate_count must be positive".to_string());
    }
    if config.gifts.copper_plate_count == 0 {
        errors.push("gifts.copper_plate_count must be positive".to_string());
    }

    // Relay
    if config.relay.cooldown_secs == 0 {
        errors.push("relay.cooldown_secs must be positive".to_string());
    }
    if config.relay.max_tracked_users == 0 {
        errors.push("relay.max_tracked_users must be positive".to_string());
    }
    if !config.relay.chat_format.contains("%message") {
        errors.push("relay.chat_format must contain the %message placeholder".to_string());
    }
    if config.relay.system_speaker.trim().is_empty() {
        errors.push("relay.system_speaker must not be empty".to_string());
    }

    match config.relay.unrecognized_commands.parse::<UnrecognizedPolicy>() {
        Ok(UnrecognizedPolicy::AllowList) if config.relay.allowed_patterns.is_empty() => {
            errors.push(
                "relay.allowed_patterns is empty - allow_list policy would reject everything"
                    .to_string(),
            );
        }
        Ok(_) => {}
        Err(message) => errors.push(format!("relay.unrecognized_commands: {}", message)),
    }

    for (i, pattern) in config.relay.allowed_patterns.iter().enumerate() {
        if Regex::new(pattern).is_err() {
            errors.push(format!(
                "relay.allowed_patterns[{}] is not a valid regex: '{}'",
                i, pattern
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
