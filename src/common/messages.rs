//! Canonical message types for relay communication.
//!
//! These are produced by the chat side, consumed once by the relay and then
//! dropped. Nothing here outlives a single event.

/// A chat message delivered by the chat platform.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Stable platform user id (Twitch `user-id` tag).
    pub speaker_id: String,
    /// Name shown in chat.
    pub speaker_display_name: String,
    /// Raw message text, untrusted.
    pub text: String,
}

impl ChatEvent {
    pub fn new(
        speaker_id: impl Into<String>,
        speaker_display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            speaker_display_name: speaker_display_name.into(),
            text: text.into(),
        }
    }
}

/// A registered chat command being invoked by a user.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Command name without the `!` prefix.
    pub command_name: String,
    pub invoker_id: String,
    pub invoker_display_name: String,
}

impl CommandInvocation {
    pub fn new(
        command_name: impl Into<String>,
        invoker_id: impl Into<String>,
        invoker_display_name: impl Into<String>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            invoker_id: invoker_id.into(),
            invoker_display_name: invoker_display_name.into(),
        }
    }

    /// Build an invocation for `command_name` from the event that carried it.
    pub fn from_event(command_name: impl Into<String>, event: &ChatEvent) -> Self {
        Self::new(
            command_name,
            event.speaker_id.clone(),
            event.speaker_display_name.clone(),
        )
    }
}
