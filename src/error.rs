use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Faults raised by the gateway connection loop.
///
/// Graceful closes are not errors; they feed the reconnect loop instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("failed to encode gateway frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// Only returned when a max-attempts ceiling is configured.
    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client already started")]
    AlreadyStarted,
    #[error("client was never started")]
    NotStarted,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("gateway task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
