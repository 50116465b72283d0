//! Shared types used across the application.

use std::fmt;
use std::str::FromStr;

/// Items granted by a gift command. Defined by configuration, immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftSpec {
    /// Factorio player receiving the items.
    pub player_name: String,
    /// Factorio prototype name, e.g. `iron-plate`.
    pub item_name: String,
    /// Always positive; enforced by config validation.
    pub count: u32,
    /// Human label used in chat replies, e.g. `Iron plates`.
    pub label: String,
}

impl GiftSpec {
    pub fn new(
        player_name: impl Into<String>,
        item_name: impl Into<String>,
        count: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            item_name: item_name.into(),
            count,
            label: label.into(),
        }
    }

    /// Console directive inserting the items into the player's inventory.
    ///
    /// The player and item names come from configuration, not chat, so they
    /// are interpolated without sanitisation.
    pub fn give_directive(&self) -> String {
        format!(
            "/sc game.players[\"{}\"].insert{{name=\"{}\", count={}}}",
            self.player_name, self.item_name, self.count
        )
    }

    /// Item name with dashes turned into spaces (`iron-plate` -> `iron plate`).
    pub fn item_display_name(&self) -> String {
        self.item_name.replace('-', " ")
    }

    /// In-game thank-you line for the viewer who paid for the gift.
    pub fn thank_you_text(&self, sender: &str) -> String {
        format!("Thanks {} for the {}!", sender, self.item_display_name())
    }
}

/// A command on its way to the game server console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    /// Directive composed by the relay itself. Sent verbatim.
    Directive(String),
    /// Unrecognized `!` text forwarded untouched under the `forward` policy.
    PassThrough(String),
    /// Untrusted chat text; sanitised and wrapped in the broadcast template.
    Chat { speaker: String, text: String },
}

impl BackendCommand {
    pub fn chat(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Directive(_) => "directive",
            Self::PassThrough(_) => "pass-through",
            Self::Chat { .. } => "chat",
        }
    }
}

/// What to do with `!` text that matches no registered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrecognizedPolicy {
    /// Forward the text to the console as-is.
    #[default]
    Forward,
    /// Drop it and answer with a usage note.
    Reject,
    /// Forward only if it matches one of the configured patterns.
    AllowList,
}

impl FromStr for UnrecognizedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "pass" | "passthrough" => Ok(Self::Forward),
            "reject" | "deny" => Ok(Self::Reject),
            "allow_list" | "allow-list" | "allowlist" => Ok(Self::AllowList),
            other => Err(format!(
                "unknown policy '{}' (use: forward, reject, allow_list)",
                other
            )),
        }
    }
}

impl fmt::Display for UnrecognizedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Forward => "forward",
            Self::Reject => "reject",
            Self::AllowList => "allow_list",
        };
        f.write_str(name)
    }
}
