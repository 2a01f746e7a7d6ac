//! Bitcoin P2PKH address in its Base58Check text form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// A signing address as it appears in AIP envelopes and BAP ID operations.
///
/// Only the textual shape is checked here (alphabet and length). Checksum
/// verification lives in `bap-crypto`, which owns the hashing primitives.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitcoinAddress(String);

impl BitcoinAddress {
    pub const MIN_LEN: usize = 26;
    pub const MAX_LEN: usize = 35;

    /// Wrap a string without validation. Use `parse` for untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let addr = Self(raw.to_string());
        if addr.is_valid() {
            Ok(addr)
        } else {
            Err(TypesError::InvalidAddress(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether the text is plausibly a Base58Check address.
    pub fn is_valid(&self) -> bool {
        (Self::MIN_LEN..=Self::MAX_LEN).contains(&self.0.len())
            && self.0.chars().all(|c| BASE58_ALPHABET.contains(c))
    }
}

impl fmt::Display for BitcoinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BitcoinAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mainnet_p2pkh() {
        assert!(BitcoinAddress::parse("1BAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT").is_ok());
        assert!(BitcoinAddress::parse("134a6TXxzgQ9Az3w8BcvgdZyA5UqRL89da").is_ok());
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        // '0', 'O', 'I' and 'l' are excluded from Base58.
        assert!(BitcoinAddress::parse("10APSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT").is_err());
        assert!(BitcoinAddress::parse("1lAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT").is_err());
    }

    #[test]
    fn rejects_bad_length() {
        assert!(BitcoinAddress::parse("1BAP").is_err());
        assert!(BitcoinAddress::parse("").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let a = BitcoinAddress::new("1BAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT");
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            "\"1BAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT\""
        );
    }
}
