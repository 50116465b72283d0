//! Turns Twitch PRIVMSGs into chat events and carries replies back.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::common::error::{ChatError, ChatResult};
use crate::common::messages::ChatEvent;
use crate::protocol::irc::{privmsg, IrcMessage};
use crate::relay::ChatReplier;

/// Twitch drops chat messages longer than this.
pub const MAX_REPLY_CHARS: usize = 500;

/// Replies in a channel, threaded under the message being answered.
#[derive(Debug, Clone)]
pub struct TwitchReplier {
    out_tx: mpsc::UnboundedSender<String>,
    channel: String,
    parent_id: Option<String>,
}

impl TwitchReplier {
    pub fn new(
        out_tx: mpsc::UnboundedSender<String>,
        channel: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            out_tx,
            channel: channel.into(),
            parent_id,
        }
    }
}

#[async_trait]
impl ChatReplier for TwitchReplier {
    async fn reply(&self, text: &str) -> ChatResult<()> {
        let text: String = text
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .take(MAX_REPLY_CHARS)
            .collect();

        debug!("Reply in {}: {}", self.channel, text);
        self.out_tx
            .send(privmsg(&self.channel, &text, self.parent_id.as_deref()))
            .map_err(|_| ChatError::SendFailed {
                message: "chat connection is gone".to_string(),
            })
    }
}

/// Chat event for a PRIVMSG, or `None` if it lacks a speaker.
///
/// The speaker id is the `user-id` tag, falling back to the login name when
/// tags were not negotiated.
pub fn event_from_privmsg(msg: &IrcMessage) -> Option<ChatEvent> {
    let nick = msg.nick();
    let speaker_id = msg.tag("user-id").or(nick)?;
    let display_name = msg.tag("display-name").or(nick).unwrap_or(speaker_id);
    let text = msg.trailing.as_deref().unwrap_or_default();

    Some(ChatEvent::new(speaker_id, display_name, text))
}
