//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

use crate::common::types::UnrecognizedPolicy;

/// Broadcast template for relayed chat lines.
pub const DEFAULT_CHAT_FORMAT: &str =
    "/silent-command game.print(\"[color=purple]%user[/color]: %message\")";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub twitch: TwitchConfig,
    pub factorio: FactorioConfig,
    pub gifts: GiftsConfig,
    pub relay: RelayConfig,
}

/// Twitch chat connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchConfig {
    /// User access token with chat:read and chat:edit scopes.
    pub oauth_token: String,
    /// Channel to join, without the leading `#`.
    pub channel: String,
    /// If set, the token must have been issued to this client id.
    pub client_id: Option<String>,
    #[serde(default = "default_irc_host")]
    pub host: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    /// Connect with TLS. Only local test servers should turn this off.
    #[serde(default = "default_irc_tls")]
    pub tls: bool,
}

/// Factorio RCON configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FactorioConfig {
    #[serde(default = "default_rcon_host")]
    pub host: String,
    #[serde(default = "default_rcon_port")]
    pub port: u16,
    pub password: String,
    /// Player who receives items from gift commands.
    pub player: String,
    /// Upper bound for one connect + auth + command exchange.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Item counts for the gift commands.
#[derive(Debug, Clone, Deserialize)]
pub struct GiftsConfig {
    pub iron_plate_count: u32,
    pub copper_plate_count: u32,
}

/// Relay behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Minimum seconds between two gift commands by the same viewer.
    pub cooldown_secs: u64,
    /// Size at which idle cooldown entries start being swept.
    #[serde(default = "default_max_tracked_users")]
    pub max_tracked_users: usize,
    /// "forward", "reject" or "allow_list".
    #[serde(default = "default_unrecognized_commands")]
    pub unrecognized_commands: String,
    /// Regex patterns consulted by the `allow_list` policy.
    #[serde(default)]
    pub allowed_patterns: Vec<String>,
    /// Truncate raw text before escaping instead of after.
    #[serde(default)]
    pub truncate_before_escape: bool,
    #[serde(default = "default_chat_format")]
    pub chat_format: String,
    /// Speaker name on in-game lines written by the relay itself.
    #[serde(default = "default_system_speaker")]
    pub system_speaker: String,
    #[serde(default = "default_egg_reply")]
    pub egg_reply: String,
}

fn default_irc_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_irc_port() -> u16 {
    6697
}

fn default_irc_tls() -> bool {
    true
}

fn default_rcon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rcon_port() -> u16 {
    25575
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_tracked_users() -> usize {
    10_000
}

fn default_unrecognized_commands() -> String {
    UnrecognizedPolicy::Forward.to_string()
}

fn default_chat_format() -> String {
    DEFAULT_CHAT_FORMAT.to_string()
}

fn default_system_speaker() -> String {
    "Server".to_string()
}

fn default_egg_reply() -> String {
    "EGGG!!!!".to_string()
}

impl Config {
    /// Parsed pass-through policy. Falls back to `forward` on garbage, which
    /// validation rejects before the relay starts.
    pub fn unrecognized_policy(&self) -> UnrecognizedPolicy {
        self.relay.unrecognized_commands.parse().unwrap_or_default()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.relay.cooldown_secs)
    }

    pub fn rcon_timeout(&self) -> Duration {
        Duration::from_secs(self.factorio.timeout_secs)
    }

    /// IRC channel name with the `#` prefix.
    pub fn irc_channel(&self) -> String {
        format!("#{}", self.twitch.channel.trim_start_matches('#').to_lowercase())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        twitch: TwitchConfig {
            oauth_token: "oauth:abcdef123456".to_string(),
            channel: "streamer".to_string(),
            client_id: None,
            host: default_irc_host(),
            port: default_irc_port(),
            tls: default_irc_tls(),
        },
        factorio: FactorioConfig {
            host: default_rcon_host(),
            port: default_rcon_port(),
            password: "hunter2".to_string(),
            player: "Engineer".to_string(),
            timeout_secs: default_timeout_secs(),
        },
        gifts: GiftsConfig {
            iron_plate_count: 100,
            copper_plate_count: 50,
        },
        relay: RelayConfig {
            cooldown_secs: 60,
            max_tracked_users: default_max_tracked_users(),
            unrecognized_commands: default_unrecognized_commands(),
            allowed_patterns: Vec::new(),
            truncate_before_escape: false,
            chat_format: default_chat_format(),
            system_speaker: default_system_speaker(),
            egg_reply: default_egg_reply(),
        },
    }
}
