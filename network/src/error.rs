use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("event consumer went away")]
    ConsumerClosed,
}
