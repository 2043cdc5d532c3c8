use crate::infrastructure::config::ConfigError;
use feedsockets::FeedError;
use thiserror::Error;

/// Errors surfaced by the ledger's outer edges (startup, REST, wiring)
///
/// Bad stream input never produces one of these; it is dropped and logged.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Engine channel closed: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
