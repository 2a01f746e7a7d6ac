//! Signature envelope validation.

use bap_types::AipEnvelope;

use crate::prefix::BITCOIN_ECDSA;
use crate::ProtocolError;

/// Decides whether an envelope's signature is genuine.
///
/// `Ok(false)` means a well-formed envelope that does not verify; errors mean
/// the envelope could not be checked at all. Both drop the pair.
pub trait EnvelopeValidator: Send + Sync {
    fn validate(&self, envelope: &AipEnvelope) -> Result<bool, ProtocolError>;
}

/// Verifies `BITCOIN_ECDSA` envelopes as Bitcoin signed messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitcoinSignedMessageValidator;

impl EnvelopeValidator for BitcoinSignedMessageValidator {
    fn validate(&self, envelope: &AipEnvelope) -> Result<bool, ProtocolError> {
        if envelope.algorithm != BITCOIN_ECDSA {
            return Err(ProtocolError::UnsupportedAlgorithm(
                envelope.algorithm.clone(),
            ));
        }
        Ok(bap_crypto::verify_message(
            &envelope.message,
            &envelope.signature,
            &envelope.address,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_types::BitcoinAddress;

    fn secret() -> [u8; 32] {
        let mut s = [0u8; 32];
        s[31] = 5;
        s
    }

    fn envelope(algorithm: &str, message: &[u8], signed: &[u8]) -> AipEnvelope {
        AipEnvelope {
            algorithm: algorithm.to_string(),
            address: bap_crypto::address_from_secret(&secret(), true).unwrap(),
            signature: bap_crypto::sign_message(signed, &secret(), true).unwrap(),
            indices: Vec::new(),
            message: message.to_vec(),
        }
    }

    #[test]
    fn genuine_signature_validates() {
        let env = envelope(BITCOIN_ECDSA, b"jX|", b"jX|");
        assert_eq!(BitcoinSignedMessageValidator.validate(&env), Ok(true));
    }

    #[test]
    fn tampered_message_fails() {
        let env = envelope(BITCOIN_ECDSA, b"jY|", b"jX|");
        assert_eq!(BitcoinSignedMessageValidator.validate(&env), Ok(false));
    }

    #[test]
    fn other_signer_fails() {
        let mut env = envelope(BITCOIN_ECDSA, b"jX|", b"jX|");
        env.address = BitcoinAddress::new("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(BitcoinSignedMessageValidator.validate(&env), Ok(false));
    }

    #[test]
    fn unknown_algorithm_is_an_error() {
        let env = envelope("BITCOIN_SCHNORR", b"jX|", b"jX|");
        assert!(matches!(
            BitcoinSignedMessageValidator.validate(&env),
            Err(ProtocolError::UnsupportedAlgorithm(_))
        ));
    }
}
