//! Identity storage trait.

use bap_types::{AddressEntry, BitcoinAddress, IdKey, Identity};

use crate::paging::{Page, PageRequest};
use crate::StoreError;

/// A typed mutation of one identity document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityUpdate {
    /// Insert a new identity. An existing document with the same key is left
    /// untouched and reported as `IdentityWrite::Duplicate`.
    Create(Identity),
    /// Set the current address to `entry.address` and add `entry` to the
    /// address history if not already present.
    Rotate { id_key: IdKey, entry: AddressEntry },
}

impl IdentityUpdate {
    pub fn id_key(&self) -> &IdKey {
        match self {
            Self::Create(identity) => &identity.id_key,
            Self::Rotate { id_key, .. } => id_key,
        }
    }
}

/// What an `IdentityUpdate` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityWrite {
    Created,
    Duplicate,
    /// `appended` is false when the history already held the entry.
    Rotated { appended: bool },
    /// The identity to rotate does not exist.
    Missing,
}

/// Trait for identity storage operations.
pub trait IdentityStore {
    fn find_identity(&self, id_key: &IdKey) -> Result<Option<Identity>, StoreError>;

    /// The identity whose current signing address is `address`.
    fn find_by_current_address(
        &self,
        address: &BitcoinAddress,
    ) -> Result<Option<Identity>, StoreError>;

    fn update_identity(&self, update: &IdentityUpdate) -> Result<IdentityWrite, StoreError>;

    /// Replace (or insert) a whole document.
    fn put_identity(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Identities that have ever used `address`.
    fn find_by_address(&self, _address: &BitcoinAddress) -> Result<Vec<Identity>, StoreError> {
        Err(StoreError::Unsupported("find_by_address"))
    }

    /// Identities ordered by first-seen height.
    fn list_identities(&self, _page: &PageRequest) -> Result<Page<Identity>, StoreError> {
        Err(StoreError::Unsupported("list_identities"))
    }

    fn identity_count(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported("identity_count"))
    }
}

/// Apply an update to an in-memory document slot. Backends that store
/// whole documents compile updates through this.
pub fn apply_identity_update(slot: &mut Option<Identity>, update: &IdentityUpdate) -> IdentityWrite {
    match (slot.as_mut(), update) {
        (None, IdentityUpdate::Create(identity)) => {
            *slot = Some(identity.clone());
            IdentityWrite::Created
        }
        (Some(_), IdentityUpdate::Create(_)) => IdentityWrite::Duplicate,
        (Some(identity), IdentityUpdate::Rotate { entry, .. }) => IdentityWrite::Rotated {
            appended: identity.rotate(entry.clone()),
        },
        (None, IdentityUpdate::Rotate { .. }) => IdentityWrite::Missing,
    }
}
