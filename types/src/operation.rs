//! Transient protocol operations extracted from a transaction.
//!
//! None of these are persisted: the extractor produces `OperationPair`s, the
//! validator checks the envelope, and the applier turns them into documents.

use std::fmt;
use std::str::FromStr;

use crate::{BitcoinAddress, ClaimHash, IdKey, TypesError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Id,
    Attest,
    Revoke,
    Alias,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Id, Self::Attest, Self::Revoke, Self::Alias];

    /// The keyword used on-chain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Attest => "ATTEST",
            Self::Revoke => "REVOKE",
            Self::Alias => "ALIAS",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TypesError::UnknownOperation(s.to_string()))
    }
}

/// A decoded BAP operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BapOperation {
    /// Create an identity, or rotate its signing address to `address`.
    Id { id_key: IdKey, address: BitcoinAddress },
    Attest { claim: ClaimHash, sequence: u64 },
    Revoke { claim: ClaimHash, sequence: u64 },
    /// Replace the profile of `id_key` with the JSON in `profile`.
    Alias { id_key: IdKey, profile: String },
}

impl BapOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Id { .. } => OperationKind::Id,
            Self::Attest { .. } => OperationKind::Attest,
            Self::Revoke { .. } => OperationKind::Revoke,
            Self::Alias { .. } => OperationKind::Alias,
        }
    }
}

/// A decoded AIP signature envelope.
///
/// `message` is the exact byte string the signature commits to, assembled by
/// the extractor from the cells preceding the envelope in the same output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AipEnvelope {
    pub algorithm: String,
    pub address: BitcoinAddress,
    pub signature: String,
    pub indices: Vec<usize>,
    pub message: Vec<u8>,
}

/// An operation together with the envelope that signed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationPair {
    pub operation: BapOperation,
    pub envelope: AipEnvelope,
    /// Index of the output the pair was found in.
    pub output: usize,
}

impl OperationPair {
    /// The signing address claimed by the envelope.
    pub fn signer(&self) -> &BitcoinAddress {
        &self.envelope.address
    }
}
