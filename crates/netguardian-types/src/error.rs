//! Errors raised while constructing endpoint and subnet values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid base URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("unsupported scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("base URL {0:?} has no host")]
    MissingHost(String),

    #[error("invalid subnet prefix {0:?} (expected three dotted octets, e.g. 192.168.1)")]
    InvalidPrefix(String),
}
