use thiserror::Error;

/// Errors that can occur in the onboarding and reasoning clients
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("WebSocket not connected")]
    NotConnected,

    #[error("No active session")]
    NoActiveSession,

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
