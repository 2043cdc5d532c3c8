use thiserror::Error;

/// Main error type for feedsockets
#[derive(Error, Debug)]
pub enum FeedError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed by the remote end
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Frame could not be decoded into a message
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reconnection budget exhausted
    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectionExhausted { attempts: usize },

    /// Handler rejected a message
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for feedsockets operations
pub type Result<T> = std::result::Result<T, FeedError>;
