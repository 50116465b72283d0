//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures talking to the game server console (RCON).
///
/// Always surfaced to callers as a value; the relay never lets one escape
/// as a crash.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("RCON authentication rejected")]
    AuthFailed,

    #[error("RCON request timed out")]
    Timeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat platform (Twitch) errors.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Failed to send message: {message}")]
    SendFailed { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type alias for chat operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
