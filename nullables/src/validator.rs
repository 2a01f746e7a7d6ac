//! Nullable envelope validator: decides by signing address, never checks a signature.

use std::collections::HashSet;

use bap_protocol::{EnvelopeValidator, ProtocolError};
use bap_types::{AipEnvelope, BitcoinAddress};

#[derive(Clone, Debug, Default)]
pub struct NullValidator {
    reject_all: bool,
    rejected: HashSet<BitcoinAddress>,
}

impl NullValidator {
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn reject_all() -> Self {
        Self {
            reject_all: true,
            rejected: HashSet::new(),
        }
    }

    /// Accept everything except envelopes signed by `addresses`.
    pub fn rejecting(addresses: impl IntoIterator<Item = BitcoinAddress>) -> Self {
        Self {
            reject_all: false,
            rejected: addresses.into_iter().collect(),
        }
    }
}

impl EnvelopeValidator for NullValidator {
    fn validate(&self, envelope: &AipEnvelope) -> Result<bool, ProtocolError> {
        Ok(!self.reject_all && !self.rejected.contains(&envelope.address))
    }
}
