use accounts_query_schema::{DecodeError, LayoutError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Unknown field '{field}' on {record}")]
    UnknownField { record: String, field: String },

    #[error("Filter on '{field}' encodes to {actual} bytes, field is {expected} bytes")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Unknown commitment '{0}'")]
    UnknownCommitment(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Why a returned account could not be turned into a record.
#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
