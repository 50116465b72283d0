//! Chat command routing.
//!
//! Classifies chat text as plain chat, a registered `!` command or an
//! unrecognized `!` command, and decides what happens to the latter.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::common::types::{BackendCommand, GiftSpec, UnrecognizedPolicy};
use crate::config::types::Config;
use crate::relay::filter::CommandAllowList;

/// Prefix marking chat text as a command.
pub const COMMAND_PREFIX: char = '!';

/// What a registered command does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Answer the invoker with fixed text. Never touches the backend.
    FixedReply(String),
    /// Cooldown-gated item grant.
    Gift(GiftSpec),
}

/// Where a piece of chat text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Ordinary chat, broadcast in game with the speaker's name.
    PlainChat,
    /// `!name` where `name` is registered.
    Registered {
        name: &'a str,
        action: &'a CommandAction,
    },
    /// A bare `!` or `!name` with no registered handler.
    UnrecognizedBang,
}

/// Routes chat text to command handlers.
#[derive(Debug, Clone, Default)]
pub struct CommandRouter {
    commands: BTreeMap<String, CommandAction>,
    policy: UnrecognizedPolicy,
    allow_list: CommandAllowList,
}

impl CommandRouter {
    pub fn new(policy: UnrecognizedPolicy, allow_list: CommandAllowList) -> Self {
        Self {
            commands: BTreeMap::new(),
            policy,
            allow_list,
        }
    }

    /// Router with the `egg`, `IronPlates` and `CopperPlates` commands.
    pub fn from_config(config: &Config) -> Self {
        let policy = config.unrecognized_policy();
        let mut router = Self::new(
            policy,
            CommandAllowList::new(&config.relay.allowed_patterns),
        );

        let player = &config.factorio.player;
        router.register("egg", CommandAction::FixedReply(config.relay.egg_reply.clone()));
        router.register(
            "IronPlates",
            CommandAction::Gift(GiftSpec::new(
                player.as_str(),
                "iron-plate",
                config.gifts.iron_plate_count,
                "Iron plates",
            )),
        );
        router.register(
            "CopperPlates",
            CommandAction::Gift(GiftSpec::new(
                player.as_str(),
                "copper-plate",
                config.gifts.copper_plate_count,
                "Copper plates",
            )),
        );

        info!(
            "Registered commands: {} (unrecognized commands: {})",
            router.command_names().join(", "),
            policy
        );
        router
    }

    /// Bind `name` (case-sensitive, without the `!`) to an action.
    pub fn register(&mut self, name: impl Into<String>, action: CommandAction) {
        self.commands.insert(name.into(), action);
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandAction> {
        self.commands.get(name)
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn policy(&self) -> UnrecognizedPolicy {
        self.policy
    }

    /// Classify `text`. The command name is everything between the `!` and
    /// the first whitespace, so `"! egg"` is unrecognized.
    pub fn route<'a>(&'a self, text: &str) -> Route<'a> {
        let Some(rest) = text.strip_prefix(COMMAND_PREFIX) else {
            return Route::PlainChat;
        };

        let name = rest.split(char::is_whitespace).next().unwrap_or_default();
        if name.is_empty() {
            return Route::UnrecognizedBang;
        }

        match self.commands.get_key_value(name) {
            Some((name, action)) => Route::Registered { name, action },
            None => {
                debug!("No handler for command '{}'", name);
                Route::UnrecognizedBang
            }
        }
    }

    /// Backend command for unrecognized `!` text, or `None` if policy drops it.
    pub fn pass_through(&self, text: &str) -> Option<BackendCommand> {
        let forward = match self.policy {
            UnrecognizedPolicy::Forward => true,
            UnrecognizedPolicy::Reject => false,
            UnrecognizedPolicy::AllowList => self.allow_list.allows(text),
        };
        forward.then(|| BackendCommand::PassThrough(text.to_string()))
    }

    /// Reply for a dropped unrecognized command.
    pub fn usage(&self) -> String {
        let commands: Vec<String> = self
            .commands
            .keys()
            .map(|name| format!("{}{}", COMMAND_PREFIX, name))
            .collect();
        format!("Unknown command. Available commands: {}", commands.join(", "))
    }
}
