//! Base58Check encoding and P2PKH address derivation.
//!
//! Address format: Base58(version ++ hash160(pubkey) ++ checksum), where the
//! checksum is the first 4 bytes of SHA-256d over version ++ hash160.

use bap_types::BitcoinAddress;

use crate::hash::{hash160, sha256d};
use crate::CryptoError;

/// Version byte of mainnet pay-to-pubkey-hash addresses.
pub const P2PKH_VERSION: u8 = 0x00;

const CHECKSUM_LEN: usize = 4;

pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = sha256d(&bytes);
    bytes.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(bytes).into_string()
}

/// Decode Base58Check text into its version byte and payload.
pub fn base58check_decode(text: &str) -> Result<(u8, Vec<u8>), CryptoError> {
    let bytes = bs58::decode(text)
        .into_vec()
        .map_err(|e| CryptoError::InvalidBase58(e.to_string()))?;
    if bytes.len() < 1 + CHECKSUM_LEN {
        return Err(CryptoError::InvalidLength(bytes.len()));
    }
    let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if sha256d(body)[..CHECKSUM_LEN] != *checksum {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok((body[0], body[1..].to_vec()))
}

/// P2PKH address of a SEC1-encoded public key (compressed or not).
pub fn address_from_pubkey(sec1: &[u8]) -> BitcoinAddress {
    BitcoinAddress::new(base58check_encode(P2PKH_VERSION, &hash160(sec1)))
}

/// Whether `address` is a checksummed mainnet P2PKH address.
pub fn validate_address(address: &BitcoinAddress) -> bool {
    matches!(
        base58check_decode(address.as_str()),
        Ok((P2PKH_VERSION, payload)) if payload.len() == 20
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_compressed_address() {
        let pubkey =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        assert_eq!(
            address_from_pubkey(&pubkey).as_str(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn protocol_prefixes_are_valid_addresses() {
        assert!(validate_address(&BitcoinAddress::new(
            "1BAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT"
        )));
        assert!(validate_address(&BitcoinAddress::new(
            "15PciHG22SNLQJXMoSUaWVi7WSqc7hCfva"
        )));
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        assert_eq!(
            base58check_decode("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ"),
            Err(CryptoError::ChecksumMismatch)
        );
    }

    #[test]
    fn non_base58_is_rejected() {
        assert!(matches!(
            base58check_decode("0OIl"),
            Err(CryptoError::InvalidBase58(_))
        ));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = [0xabu8; 20];
        let text = base58check_encode(P2PKH_VERSION, &payload);
        let (version, decoded) = base58check_decode(&text).unwrap();
        assert_eq!(version, P2PKH_VERSION);
        assert_eq!(decoded, payload);
    }
}
