//! What applying one operation did to the store.

use bap_types::OperationKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    IdentityCreated,
    /// Another writer created the same identity key first.
    IdentityDuplicate,
    AddressRotated { appended: bool },
    /// An ID signed by an address that is not the identity's current one.
    StaleId,
    /// The pair was already applied from this transaction.
    Replayed,
    AttestationCreated,
    SignerAdded,
    SignerReplaced { previous: u64 },
    /// The stored sequence was equal or higher.
    SignerRejected { stored: u64 },
    Revoked { removed: usize },
    ProfileUpdated,
    /// The ALIAS payload was not a JSON object.
    InvalidProfile { reason: String },
    /// The signer resolves to no identity.
    Orphaned { kind: OperationKind },
}

impl ApplyOutcome {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IdentityCreated => "identity_created",
            Self::IdentityDuplicate => "identity_duplicate",
            Self::AddressRotated { .. } => "address_rotated",
            Self::StaleId => "stale_id",
            Self::Replayed => "replayed",
            Self::AttestationCreated => "attestation_created",
            Self::SignerAdded => "signer_added",
            Self::SignerReplaced { .. } => "signer_replaced",
            Self::SignerRejected { .. } => "signer_rejected",
            Self::Revoked { .. } => "revoked",
            Self::ProfileUpdated => "profile_updated",
            Self::InvalidProfile { .. } => "invalid_profile",
            Self::Orphaned { .. } => "orphaned",
        }
    }

    /// Whether the store may have changed.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::IdentityCreated
                | Self::AddressRotated { appended: true }
                | Self::AttestationCreated
                | Self::SignerAdded
                | Self::SignerReplaced { .. }
                | Self::ProfileUpdated
        ) || matches!(self, Self::Revoked { removed } if *removed > 0)
    }
}
