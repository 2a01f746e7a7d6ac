//! Bitcoin signed messages with compact recoverable secp256k1 signatures.
//!
//! The digest is SHA-256d over `varint(24) "Bitcoin Signed Message:\n"
//! varint(len) message`. A signature is 65 bytes, base64 encoded: a header
//! byte (27 + recovery id, plus 4 when the key is compressed) followed by
//! r and s.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bap_types::BitcoinAddress;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::address::address_from_pubkey;
use crate::hash::sha256d;
use crate::CryptoError;

const MAGIC: &[u8] = b"Bitcoin Signed Message:\n";
const COMPACT_LEN: usize = 65;
const HEADER_BASE: u8 = 27;
const HEADER_COMPRESSED: u8 = 4;

fn write_compact_size(buf: &mut Vec<u8>, n: usize) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&(n as u64).to_le_bytes());
        }
    }
}

/// Digest a Bitcoin signed message commits to.
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(MAGIC.len() + message.len() + 10);
    write_compact_size(&mut buf, MAGIC.len());
    buf.extend_from_slice(MAGIC);
    write_compact_size(&mut buf, message.len());
    buf.extend_from_slice(message);
    sha256d(&buf)
}

/// P2PKH address controlled by a raw 32-byte secret key.
pub fn address_from_secret(secret: &[u8; 32], compressed: bool) -> Result<BitcoinAddress, CryptoError> {
    let key = SigningKey::from_slice(secret).map_err(|_| CryptoError::InvalidSecretKey)?;
    let point = key.verifying_key().to_encoded_point(compressed);
    Ok(address_from_pubkey(point.as_bytes()))
}

/// Sign `message` and return the base64 compact signature.
pub fn sign_message(
    message: &[u8],
    secret: &[u8; 32],
    compressed: bool,
) -> Result<String, CryptoError> {
    let key = SigningKey::from_slice(secret).map_err(|_| CryptoError::InvalidSecretKey)?;
    let digest = message_digest(message);
    let (sig, recid) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    let mut compact = [0u8; COMPACT_LEN];
    compact[0] = HEADER_BASE
        + recid.to_byte()
        + if compressed { HEADER_COMPRESSED } else { 0 };
    compact[1..].copy_from_slice(&sig.to_bytes());
    Ok(STANDARD.encode(compact))
}

/// Recover the P2PKH address that produced `signature` over `message`.
pub fn recover_address(message: &[u8], signature: &str) -> Result<BitcoinAddress, CryptoError> {
    let raw = STANDARD
        .decode(signature.trim())
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;
    if raw.len() != COMPACT_LEN {
        return Err(CryptoError::InvalidSignatureLength(raw.len()));
    }

    let header = raw[0];
    if !(HEADER_BASE..HEADER_BASE + 8).contains(&header) {
        return Err(CryptoError::InvalidHeader(header));
    }
    let compressed = header >= HEADER_BASE + HEADER_COMPRESSED;
    let mut recid = (header - HEADER_BASE) & 3;

    let mut sig = Signature::from_slice(&raw[1..])
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    // Older wallets emit high-S signatures; negating s flips R's y parity.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid ^= 1;
    }
    let recid = RecoveryId::from_byte(recid).ok_or(CryptoError::InvalidHeader(header))?;

    let digest = message_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_from_pubkey(key.to_encoded_point(compressed).as_bytes()))
}

/// Whether `signature` over `message` was produced by `address`.
///
/// Structural problems with the signature are errors; a well-formed
/// signature from a different key is `Ok(false)`.
pub fn verify_message(
    message: &[u8],
    signature: &str,
    address: &BitcoinAddress,
) -> Result<bool, CryptoError> {
    Ok(&recover_address(message, signature)? == address)
}
