//! Attestation storage trait.

use bap_types::attestation::SignerChange;
use bap_types::{Attestation, ClaimHash, IdKey, Signer};

use crate::StoreError;

/// A typed mutation of one attestation document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttestationUpdate {
    /// Create the attestation with `signer`, or offer `signer` to the
    /// existing one (replace only on a strictly greater sequence).
    Sign { claim: ClaimHash, signer: Signer },
    /// Pull the identity's signer entries with `sequence <= sequence`.
    Revoke {
        claim: ClaimHash,
        id_key: IdKey,
        sequence: u64,
    },
}

impl AttestationUpdate {
    pub fn claim(&self) -> &ClaimHash {
        match self {
            Self::Sign { claim, .. } | Self::Revoke { claim, .. } => claim,
        }
    }
}

/// What an `AttestationUpdate` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttestationWrite {
    Created,
    Signer(SignerChange),
    Revoked(usize),
    /// Revoke against a claim hash with no attestation.
    Missing,
}

/// Trait for attestation storage operations.
pub trait AttestationStore {
    fn find_attestation(&self, claim: &ClaimHash) -> Result<Option<Attestation>, StoreError>;

    fn update_attestation(
        &self,
        update: &AttestationUpdate,
    ) -> Result<AttestationWrite, StoreError>;

    fn put_attestation(&self, attestation: &Attestation) -> Result<(), StoreError>;

    fn attestation_count(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported("attestation_count"))
    }
}

/// Apply an update to an in-memory document slot. Backends that store
/// whole documents compile updates through this.
pub fn apply_attestation_update(
    slot: &mut Option<Attestation>,
    update: &AttestationUpdate,
) -> AttestationWrite {
    match (slot.as_mut(), update) {
        (None, AttestationUpdate::Sign { claim, signer }) => {
            *slot = Some(Attestation::new(*claim, signer.clone()));
            AttestationWrite::Created
        }
        (Some(att), AttestationUpdate::Sign { signer, .. }) => {
            AttestationWrite::Signer(att.offer(signer.clone()))
        }
        (None, AttestationUpdate::Revoke { .. }) => AttestationWrite::Missing,
        (Some(att), AttestationUpdate::Revoke {
            id_key, sequence, ..
        }) => AttestationWrite::Revoked(att.revoke(id_key, *sequence)),
    }
}
