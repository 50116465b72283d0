//! OAuth token validation against the Twitch identity service.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::common::error::{ChatError, ChatResult};

pub const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";

/// Upper bound for the whole validation request.
pub const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Scopes the relay needs to read and write chat.
const REQUIRED_SCOPES: &[&str] = &["chat:read", "chat:edit"];

/// Owner and lifetime of a user access token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    pub login: String,
    pub user_id: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Token without the `oauth:` prefix IRC wants.
pub fn bare_token(token: &str) -> &str {
    token.strip_prefix("oauth:").unwrap_or(token)
}

/// Validate `token` with Twitch.
pub async fn validate_token(token: &str, expected_client_id: Option<&str>) -> ChatResult<TokenInfo> {
    validate_token_at(VALIDATE_URL, token, expected_client_id).await
}

/// HTTP client whose requests give up after `timeout`.
pub fn http_client(timeout: Duration) -> ChatResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Validate `token` against `url`.
pub async fn validate_token_at(
    url: &str,
    token: &str,
    expected_client_id: Option<&str>,
) -> ChatResult<TokenInfo> {
    let client = http_client(VALIDATE_TIMEOUT)?;
    validate_with(&client, url, token, expected_client_id).await
}

/// Fails with [`ChatError::AuthFailed`] if the token is rejected or was issued
/// to a different client than `expected_client_id`.
pub async fn validate_with(
    client: &Client,
    url: &str,
    token: &str,
    expected_client_id: Option<&str>,
) -> ChatResult<TokenInfo> {
    debug!("Validating Twitch token");

    let response = client
        .get(url)
        .header("Authorization", format!("OAuth {}", bare_token(token)))
        .send()
        .await?;

    if response.status() == StatusCode::UNAUTHORIZED {
        return Err(ChatError::AuthFailed {
            reason: "token is invalid or expired".to_string(),
        });
    }

    let body = response.error_for_status()?.text().await?;
    let info: TokenInfo = serde_json::from_str(&body).map_err(|e| ChatError::AuthFailed {
        reason: format!("unreadable validation response: {}", e),
    })?;

    if let Some(expected) = expected_client_id {
        if info.client_id != expected {
            return Err(ChatError::AuthFailed {
                reason: format!(
                    "token was issued to client {} instead of {}",
                    info.client_id, expected
                ),
            });
        }
    }

    for scope in REQUIRED_SCOPES {
        if !info.scopes.iter().any(|s| s == scope) {
            warn!("Token is missing the {} scope", scope);
        }
    }

    info!(
        "Twitch token valid for {} (expires in {}s)",
        info.login, info.expires_in
    );
    Ok(info)
}
