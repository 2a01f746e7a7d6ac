//! Fundamental types for the BAP indexer.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identifiers (identity keys, addresses, hashes), the persisted documents
//! (identities, attestations, profiles) and the transient protocol operations
//! extracted from transactions.

pub mod address;
pub mod attestation;
pub mod block;
pub mod error;
pub mod hash;
pub mod identity;
pub mod keys;
pub mod operation;
pub mod profile;
pub mod time;

pub use address::BitcoinAddress;
pub use attestation::{Attestation, Signer};
pub use block::{BlockContext, BlockHeight};
pub use error::TypesError;
pub use hash::{ClaimHash, TxHash};
pub use identity::{AddressEntry, Identity};
pub use keys::IdKey;
pub use operation::{AipEnvelope, BapOperation, OperationKind, OperationPair};
pub use profile::Profile;
pub use time::Timestamp;
