//! Backend gateway: one console command per transient RCON connection.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::common::error::{BackendError, BackendResult};
use crate::config::types::Config;
use crate::protocol::rcon::RconConnection;

/// Characters of a command shown in logs.
const LOG_PREVIEW_CHARS: usize = 50;

/// Executes one command on the game server console.
///
/// Implementations never retry and never panic on transport failure:
/// every call ends in a definite `Ok` or `Err`.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn execute(&self, command: &str) -> BackendResult<String>;
}

/// Gateway that opens a fresh authenticated RCON session per command.
pub struct RconGateway {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl RconGateway {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.factorio.host.clone(),
            config.factorio.port,
            config.factorio.password.clone(),
            config.rcon_timeout(),
        )
    }

    async fn exchange(&self, command: &str) -> BackendResult<String> {
        let mut connection = RconConnection::connect(&self.host, self.port, &self.password).await?;
        let result = connection.execute(command).await;

        // The connection is dropped either way; a failed close only matters
        // if the command itself went through.
        if let Err(e) = connection.close().await {
            debug!("Error closing RCON connection: {}", e);
        }
        result
    }
}

#[async_trait]
impl BackendGateway for RconGateway {
    async fn execute(&self, command: &str) -> BackendResult<String> {
        let preview: String = command.chars().take(LOG_PREVIEW_CHARS).collect();
        debug!("RCON -> {}:{} {}", self.host, self.port, preview);

        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(Ok(response)) => {
                debug!("RCON <- {} bytes", response.len());
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("RCON command failed: {}", e);
                Err(e)
            }
            Err(_) => {
                warn!("RCON command timed out after {:?}", self.timeout);
                Err(BackendError::Timeout)
            }
        }
    }
}
