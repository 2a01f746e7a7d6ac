//! Profile storage trait.

use bap_types::{IdKey, Profile};

use crate::StoreError;

pub trait ProfileStore {
    fn find_profile(&self, id_key: &IdKey) -> Result<Option<Profile>, StoreError>;

    /// Insert or fully replace the profile of `profile.id_key`.
    fn put_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    fn profile_count(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported("profile_count"))
    }
}
