//! Price feed error types.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The symbol has no upstream mapping. Never retried.
    #[error("unsupported asset symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("upstream returned status {0}")]
    UpstreamStatus(StatusCode),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed upstream payload: {0}")]
    Payload(String),
}

impl FeedError {
    /// Whether the backoff policy applies: network-level failures, rate
    /// limiting, and server errors. Every other HTTP status (and an
    /// unmapped symbol) fails immediately.
    pub fn is_retriable(&self) -> bool {
        match self {
            FeedError::Transport(_) => true,
            FeedError::UpstreamStatus(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
