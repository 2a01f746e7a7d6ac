//! Cryptographic primitives for the BAP indexer.
//!
//! - **SHA-256d** for transaction ids and signed-message digests
//! - **HASH160** (RIPEMD-160 of SHA-256) for P2PKH addresses
//! - **Base58Check** address encoding
//! - **secp256k1 compact signatures** over Bitcoin signed messages (AIP `BITCOIN_ECDSA`)

pub mod address;
pub mod error;
pub mod hash;
pub mod sign;

pub use address::{address_from_pubkey, base58check_decode, base58check_encode, validate_address};
pub use error::CryptoError;
pub use hash::{hash160, hash_transaction, sha256, sha256d};
pub use sign::{address_from_secret, message_digest, recover_address, sign_message, verify_message};
