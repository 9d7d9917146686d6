//! Discovery subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("endpoint cache error: {0}")]
    Cache(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The run was superseded by a newer run or cancelled by the caller.
    #[error("discovery run cancelled")]
    Cancelled,

    /// Every configured prefix was swept without a live backend.
    #[error("{0}")]
    Exhausted(String),
}
