//! Relay orchestrator: one chat event or command invocation at a time.
//!
//! Holds the router, the rate limiter and a backend gateway. It owns no
//! connection of its own; many events can be in flight at once and each
//! gets its own backend exchange.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::common::error::ChatResult;
use crate::common::messages::{ChatEvent, CommandInvocation};
use crate::common::types::{BackendCommand, GiftSpec};
use crate::config::types::Config;
use crate::relay::cooldown::{CooldownStatus, RateLimiter};
use crate::relay::formatter::DirectiveRenderer;
use crate::relay::gateway::BackendGateway;
use crate::relay::router::{CommandAction, CommandRouter, Route};
use crate::relay::sanitizer::Sanitizer;

/// Reply sent when a gift's backend call fails.
pub const GIFT_FAILURE_REPLY: &str = "Sorry, there was an error sending the items!";

/// Reply sent when relaying plain chat fails.
pub const RELAY_FAILURE_REPLY: &str = "Sorry, your message could not be sent to the game.";

/// Reply facility scoped to the event being handled.
#[async_trait]
pub trait ChatReplier: Send + Sync {
    async fn reply(&self, text: &str) -> ChatResult<()>;
}

/// How an event or invocation was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Empty text, nothing to do.
    Ignored,
    /// Plain chat broadcast in game.
    Relayed,
    /// Unrecognized `!` text sent to the console.
    Forwarded,
    /// Unrecognized `!` text dropped by policy.
    Rejected,
    /// Fixed-reply command answered.
    Replied,
    /// Gift refused because the invoker is cooling down.
    CooldownActive { remaining_secs: u64 },
    /// Items granted and cooldown recorded.
    Gifted,
    /// The backend call failed; the user has been told.
    BackendFailed,
    /// Invocation named a command that is not registered.
    UnknownCommand,
}

/// Wires chat events to the router, rate limiter and backend.
pub struct RelayOrchestrator {
    router: CommandRouter,
    limiter: RateLimiter,
    gateway: Arc<dyn BackendGateway>,
    renderer: DirectiveRenderer,
    system_speaker: String,
}

impl RelayOrchestrator {
    pub fn new(config: &Config, gateway: Arc<dyn BackendGateway>) -> Self {
        let sanitizer = Sanitizer::from_flag(config.relay.truncate_before_escape);
        Self {
            router: CommandRouter::from_config(config),
            limiter: RateLimiter::new(config.cooldown(), config.relay.max_tracked_users),
            gateway,
            renderer: DirectiveRenderer::new(config.relay.chat_format.clone(), sanitizer),
            system_speaker: config.relay.system_speaker.clone(),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Handle one inbound chat message.
    pub async fn handle_chat_event(
        &self,
        event: &ChatEvent,
        replier: &dyn ChatReplier,
    ) -> RelayOutcome {
        if event.text.is_empty() {
            debug!(user = %event.speaker_id, "Ignoring empty chat message");
            return RelayOutcome::Ignored;
        }

        match self.router.route(&event.text) {
            Route::PlainChat => {
                let command =
                    BackendCommand::chat(event.speaker_display_name.clone(), event.text.clone());
                match self.send(&command).await {
                    Ok(()) => RelayOutcome::Relayed,
                    Err(()) => {
                        send_reply(replier, RELAY_FAILURE_REPLY).await;
                        RelayOutcome::BackendFailed
                    }
                }
            }
            Route::Registered { name, .. } => {
                let invocation = CommandInvocation::from_event(name, event);
                self.handle_command(&invocation, replier).await
            }
            Route::UnrecognizedBang => match self.router.pass_through(&event.text) {
                Some(command) => {
                    info!(user = %event.speaker_id, "Forwarding unrecognized command to console");
                    match self.send(&command).await {
                        Ok(()) => RelayOutcome::Forwarded,
                        Err(()) => {
                            send_reply(replier, RELAY_FAILURE_REPLY).await;
                            RelayOutcome::BackendFailed
                        }
                    }
                }
                None => {
                    info!(
                        user = %event.speaker_id,
                        policy = %self.router.policy(),
                        "Rejected unrecognized command"
                    );
                    send_reply(replier, &self.router.usage()).await;
                    RelayOutcome::Rejected
                }
            },
        }
    }

    /// Run a registered command for its invoker.
    pub async fn handle_command(
        &self,
        invocation: &CommandInvocation,
        replier: &dyn ChatReplier,
    ) -> RelayOutcome {
        let Some(action) = self.router.lookup(&invocation.command_name) else {
            warn!(command = %invocation.command_name, "Invocation of unregistered command");
            return RelayOutcome::UnknownCommand;
        };

        info!(
            user = %invocation.invoker_id,
            command = %invocation.command_name,
            "!{} from {}",
            invocation.command_name,
            invocation.invoker_display_name
        );

        match action {
            CommandAction::FixedReply(text) => {
                send_reply(replier, text).await;
                RelayOutcome::Replied
            }
            CommandAction::Gift(gift) => self.handle_gift(invocation, gift, replier).await,
        }
    }

    /// Cooldown-gated give-item protocol. The invoker's slot stays locked
    /// from the cooldown check until the action is recorded.
    async fn handle_gift(
        &self,
        invocation: &CommandInvocation,
        gift: &GiftSpec,
        replier: &dyn ChatReplier,
    ) -> RelayOutcome {
        let mut guard = self.limiter.lock(&invocation.invoker_id).await;

        if let CooldownStatus::Active { remaining_secs } = guard.status() {
            debug!(
                user = %invocation.invoker_id,
                command = %invocation.command_name,
                "Cooldown active, {}s left",
                remaining_secs
            );
            send_reply(
                replier,
                &format!(
                    "@{} please wait {}s before using !{} again.",
                    invocation.invoker_display_name, remaining_secs, invocation.command_name
                ),
            )
            .await;
            return RelayOutcome::CooldownActive { remaining_secs };
        }

        send_reply(replier, &format!("Sending {}!", gift.label)).await;

        if self
            .send(&BackendCommand::Directive(gift.give_directive()))
            .await
            .is_err()
        {
            send_reply(replier, GIFT_FAILURE_REPLY).await;
            return RelayOutcome::BackendFailed;
        }

        let thanks = BackendCommand::chat(
            self.system_speaker.clone(),
            gift.thank_you_text(&invocation.invoker_display_name),
        );
        if self.send(&thanks).await.is_err() {
            // Items already arrived, so the cooldown still applies
            warn!(user = %invocation.invoker_id, "Gift delivered but thank-you message failed");
        }

        guard.record_action();
        info!(
            user = %invocation.invoker_id,
            command = %invocation.command_name,
            "Gave {} x{} to {}",
            gift.item_name,
            gift.count,
            gift.player_name
        );
        RelayOutcome::Gifted
    }

    /// Render and execute one command. Failures are logged here.
    async fn send(&self, command: &BackendCommand) -> Result<(), ()> {
        let text = self.renderer.render(command);
        match self.gateway.execute(&text).await {
            Ok(response) => {
                if !response.is_empty() {
                    debug!("Console replied to {}: {}", command.kind(), response);
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to send {} to console: {}", command.kind(), e);
                Err(())
            }
        }
    }
}

/// Reply failures have nowhere to go but the log.
async fn send_reply(replier: &dyn ChatReplier, text: &str) {
    if let Err(e) = replier.reply(text).await {
        warn!("Failed to send chat reply: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::common::error::{BackendError, BackendResult, ChatError};
    use crate::common::types::UnrecognizedPolicy;
    use crate::config::types::test_config;

    /// Records every command; fails those starting with `fail_prefix`.
    #[derive(Default)]
    struct MockGateway {
        calls: Mutex<Vec<String>>,
        fail_prefix: Option<&'static str>,
        delay: Option<Duration>,
    }

    impl MockGateway {
        fn failing(prefix: &'static str) -> Self {
            Self {
                fail_prefix: Some(prefix),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BackendGateway for MockGateway {
        async fn execute(&self, command: &str) -> BackendResult<String> {
            self.calls.lock().unwrap().push(command.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.fail_prefix {
                Some(prefix) if command.starts_with(prefix) => Err(BackendError::ConnectionClosed),
                _ => Ok(String::new()),
            }
        }
    }

    #[derive(Default)]
    struct MockReplier {
        replies: Mutex<Vec<String>>,
        broken: bool,
    }

    impl MockReplier {
        fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatReplier for MockReplier {
        async fn reply(&self, text: &str) -> ChatResult<()> {
            if self.broken {
                return Err(ChatError::ConnectionClosed);
            }
            self.replies.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn setup(gateway: MockGateway) -> (RelayOrchestrator, Arc<MockGateway>) {
        setup_with(&test_config(), gateway)
    }

    fn setup_with(config: &Config, gateway: MockGateway) -> (RelayOrchestrator, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        let orchestrator = RelayOrchestrator::new(config, gateway.clone());
        (orchestrator, gateway)
    }

    fn copper(user: &str) -> CommandInvocation {
        CommandInvocation::new("CopperPlates", user, "Viewer")
    }

    #[tokio::test]
    async fn test_plain_chat_is_broadcast() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let event = ChatEvent::new("u1", "Cool<Viewer>", "hi everyone");
        let outcome = relay.handle_chat_event(&event, &replier).await;

        assert_eq!(outcome, RelayOutcome::Relayed);
        assert_eq!(
            gateway.calls(),
            vec!["/silent-command game.print(\"[color=purple]Cool&lt;Viewer&gt;[/color]: hi everyone\")"]
        );
        assert!(replier.replies().is_empty());
    }

    #[tokio::test]
    async fn test_chat_cannot_break_out_of_directive() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let event = ChatEvent::new("u1", "v", "\") game.players[1].die() --\\");
        relay.handle_chat_event(&event, &replier).await;

        let sent = &gateway.calls()[0];
        let payload = sent
            .strip_prefix("/silent-command game.print(\"")
            .and_then(|s| s.strip_suffix("\")"))
            .unwrap();
        assert!(!payload.contains('"'));
        assert!(payload.ends_with("\\\\"));
    }

    #[tokio::test]
    async fn test_empty_text_is_noop() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay
            .handle_chat_event(&ChatEvent::new("u1", "Viewer", ""), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::Ignored);
        assert!(gateway.calls().is_empty());
        assert!(replier.replies().is_empty());
    }

    #[tokio::test]
    async fn test_egg_replies_without_backend() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay
            .handle_chat_event(&ChatEvent::new("u1", "Viewer", "!egg"), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::Replied);
        assert_eq!(replier.replies(), vec!["EGGG!!!!"]);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bare_bang_forwarded_by_default() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay
            .handle_chat_event(&ChatEvent::new("u1", "Viewer", "!"), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::Forwarded);
        assert_eq!(gateway.calls(), vec!["!"]);
    }

    #[tokio::test]
    async fn test_reject_policy_replies_with_usage() {
        let mut config = test_config();
        config.relay.unrecognized_commands = UnrecognizedPolicy::Reject.to_string();
        let (relay, gateway) = setup_with(&config, MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay
            .handle_chat_event(&ChatEvent::new("u1", "Viewer", "!c game.print(1)"), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::Rejected);
        assert!(gateway.calls().is_empty());
        assert_eq!(replier.replies().len(), 1);
        assert!(replier.replies()[0].contains("!IronPlates"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gift_sends_give_then_thanks() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::Gifted);
        assert_eq!(
            gateway.calls(),
            vec![
                "/sc game.players[\"Engineer\"].insert{name=\"copper-plate\", count=50}",
                "/silent-command game.print(\"[color=purple]Server[/color]: Thanks Viewer for the copper plate!\")",
            ]
        );
        assert_eq!(replier.replies(), vec!["Sending Copper plates!"]);
        assert!(relay.limiter().is_on_cooldown("u1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gift_within_cooldown_is_refused() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        relay.handle_command(&copper("u1"), &replier).await;
        tokio::time::advance(Duration::from_secs(15)).await;
        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::CooldownActive { remaining_secs: 45 });
        assert_eq!(gateway.calls().len(), 2);
        assert_eq!(
            replier.replies().last().map(String::as_str),
            Some("@Viewer please wait 45s before using !CopperPlates again.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_iron_plates_twice_gives_once() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();
        let event = ChatEvent::new("u1", "Viewer", "!IronPlates");

        relay.handle_chat_event(&event, &replier).await;
        relay.handle_chat_event(&event, &replier).await;

        let gives = gateway
            .calls()
            .iter()
            .filter(|c| c.contains("insert{name=\"iron-plate\""))
            .count();
        assert_eq!(gives, 1);

        let replies = replier.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], "Sending Iron plates!");
        assert!(replies[1].starts_with("@Viewer please wait 60s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_expires() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        relay.handle_command(&copper("u1"), &replier).await;
        tokio::time::advance(Duration::from_secs(60)).await;
        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::Gifted);
        assert_eq!(gateway.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_is_per_user() {
        let (relay, _gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        relay.handle_command(&copper("u1"), &replier).await;
        let outcome = relay.handle_command(&copper("u2"), &replier).await;

        assert_eq!(outcome, RelayOutcome::Gifted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_does_not_record() {
        let (relay, gateway) = setup(MockGateway::failing("/sc"));
        let replier = MockReplier::default();

        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::BackendFailed);
        // No thank-you after a failed give
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(
            replier.replies(),
            vec!["Sending Copper plates!", GIFT_FAILURE_REPLY]
        );
        assert!(!relay.limiter().is_on_cooldown("u1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_thanks_still_records() {
        let (relay, gateway) = setup(MockGateway::failing("/silent-command"));
        let replier = MockReplier::default();

        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::Gifted);
        assert_eq!(gateway.calls().len(), 2);
        assert!(relay.limiter().is_on_cooldown("u1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_invocations_by_same_user() {
        let (relay, gateway) = setup(MockGateway {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let replier = MockReplier::default();
        let invocation = copper("u1");

        let (first, second) = tokio::join!(
            relay.handle_command(&invocation, &replier),
            relay.handle_command(&invocation, &replier),
        );

        let mut outcomes = [first, second];
        outcomes.sort_by_key(|o| matches!(o, RelayOutcome::CooldownActive { .. }));
        assert_eq!(outcomes[0], RelayOutcome::Gifted);
        assert!(matches!(outcomes[1], RelayOutcome::CooldownActive { .. }));
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_plain_chat_failure_replies_once() {
        let (relay, _gateway) = setup(MockGateway::failing("/silent-command"));
        let replier = MockReplier::default();

        let outcome = relay
            .handle_chat_event(&ChatEvent::new("u1", "Viewer", "hello"), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::BackendFailed);
        assert_eq!(replier.replies(), vec![RELAY_FAILURE_REPLY]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_replier_does_not_abort_gift() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier {
            broken: true,
            ..Default::default()
        };

        let outcome = relay.handle_command(&copper("u1"), &replier).await;

        assert_eq!(outcome, RelayOutcome::Gifted);
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_invocation() {
        let (relay, gateway) = setup(MockGateway::default());
        let replier = MockReplier::default();

        let outcome = relay
            .handle_command(&CommandInvocation::new("nope", "u1", "Viewer"), &replier)
            .await;

        assert_eq!(outcome, RelayOutcome::UnknownCommand);
        assert!(gateway.calls().is_empty());
    }
}
