use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("base58check checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid payload length: {0}")]
    InvalidLength(usize),

    #[error("invalid base64 signature: {0}")]
    InvalidBase64(String),

    #[error("compact signature must be 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("invalid signature header byte {0}")]
    InvalidHeader(u8),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("invalid secret key")]
    InvalidSecretKey,
}
