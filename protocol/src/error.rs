use bap_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("tape does not start with the {0} prefix")]
    WrongPrefix(&'static str),

    #[error("{kind} is missing field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("field `{0}` is not valid UTF-8")]
    NotText(&'static str),

    #[error("unknown BAP operation: {0}")]
    UnknownKind(String),

    #[error("invalid identity key: {0}")]
    InvalidIdKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid claim hash: {0}")]
    InvalidClaimHash(String),

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("ALIAS carries an empty profile")]
    EmptyProfile,

    #[error("invalid AIP index: {0}")]
    InvalidIndex(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature: {0}")]
    Signature(#[from] CryptoError),
}
