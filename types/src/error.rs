//! Errors raised while parsing the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid identity key: {0}")]
    InvalidIdKey(String),

    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),
}
