//! SHA-256 based hashing used by Bitcoin.

use bap_types::TxHash;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(Sha256::digest(data)));
    output
}

/// RIPEMD-160 of SHA-256, the P2PKH public key hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut output = [0u8; 20];
    output.copy_from_slice(&Ripemd160::digest(Sha256::digest(data)));
    output
}

/// Transaction id of a serialized transaction, in display byte order.
pub fn hash_transaction(tx_bytes: &[u8]) -> TxHash {
    let mut digest = sha256d(tx_bytes);
    digest.reverse();
    TxHash::new(digest)
}
