//! Factorio relay - Twitch chat to Factorio console bridge
//!
//! Broadcasts Twitch chat in game over RCON and lets viewers send items to
//! the streamer's character with chat commands.

mod common;
mod config;
mod protocol;
mod relay;
mod twitch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backon::BackoffBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use common::error::{AppError, ChatError};
use config::{env::get_config_path, load_and_validate, Config};
use relay::{RconGateway, RelayOrchestrator};
use twitch::auth::{validate_token, TokenInfo};
use twitch::{SessionEnd, TwitchClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Factorio relay v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let (config, token) = bootstrap(&config_path).await.map_err(|e| {
        error!("Startup failed: {}", e);
        if matches!(e, AppError::Config(_)) {
            error!("Please ensure {} exists and is properly formatted.", config_path);
            error!("See factorio-relay.conf.example for reference.");
        }
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Twitch channel: {}", config.irc_channel());
    info!("  Bot account: {}", token.login);
    info!("  RCON: {}:{}", config.factorio.host, config.factorio.port);
    info!("  Player: {}", config.factorio.player);
    info!("  Cooldown: {}s", config.relay.cooldown_secs);

    let gateway = Arc::new(RconGateway::from_config(&config));
    let orchestrator = Arc::new(RelayOrchestrator::new(&config, gateway));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let client = TwitchClient::new(&config, token.login, orchestrator, shutdown_rx);
    let mut chat_task = tokio::spawn(run_chat(client));

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - leaving chat...");
            true
        }
        result = &mut chat_task => {
            match result {
                Ok(Ok(())) => info!("Chat loop ended"),
                Ok(Err(e)) => {
                    error!("Chat loop failed: {}", e);
                    return Err(e);
                }
                Err(e) => error!("Chat task panicked: {}", e),
            }
            false
        }
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (chat loop already exited): {}", e);
        }
        match tokio::time::timeout(Duration::from_secs(5), chat_task).await {
            Ok(Ok(_)) => info!("Left chat gracefully"),
            Ok(Err(e)) => warn!("Chat task panicked: {}", e),
            Err(_) => warn!("Timed out leaving chat"),
        }
    }

    info!("Exiting...");
    Ok(())
}

/// Everything that must succeed before relaying starts.
async fn bootstrap(config_path: &str) -> Result<(Config, TokenInfo), AppError> {
    let config = load_and_validate(config_path)?;
    let token = validate_token(
        &config.twitch.oauth_token,
        config.twitch.client_id.as_deref(),
    )
    .await?;
    Ok((config, token))
}

/// Exponential backoff for chat reconnection.
/// 2s initial, 5min max, factor 2, with jitter, unlimited retries.
fn chat_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(2.0)
        .with_jitter()
        .without_max_times()
        .build()
}

/// Keep a chat session running until shutdown. A rejected login is fatal.
async fn run_chat(mut client: TwitchClient) -> Result<()> {
    let mut backoff = chat_backoff();

    loop {
        if client.is_shutting_down() {
            break;
        }

        match client.run().await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Reconnect) => {
                backoff = chat_backoff();
                continue;
            }
            Ok(SessionEnd::Closed) => warn!("Chat connection closed"),
            Err(e @ ChatError::AuthFailed { .. }) => {
                error!("Twitch rejected the login: {}", e);
                return Err(e.into());
            }
            Err(e) => error!("Chat session error: {}", e),
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(300));
        info!("Reconnecting in {:.1} seconds...", delay.as_secs_f64());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {},
            _ = client.wait_for_shutdown() => {
                info!("Shutdown signal received during backoff");
                break;
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
