//! LMDB implementation of ProfileStore.
//!
//! Profiles hold arbitrary JSON, which bincode cannot round-trip, so they
//! are stored as JSON text.

use bap_store::profile::ProfileStore;
use bap_store::StoreError;
use bap_types::{IdKey, Profile};

use crate::{LmdbEnvironment, LmdbError};

impl ProfileStore for LmdbEnvironment {
    fn find_profile(&self, id_key: &IdKey) -> Result<Option<Profile>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .profiles_db
            .get(&rtxn, id_key.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(profile).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.profiles_db
            .put(&mut wtxn, profile.id_key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn profile_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.profiles_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
