//! LMDB implementation of IdentityStore.
//!
//! The document lives in `identities`; three index databases are kept in
//! step with it inside the same write transaction.

use std::ops::Bound;

use heed::{RoTxn, RwTxn};
use tracing::warn;

use bap_store::identity::{apply_identity_update, IdentityStore, IdentityUpdate, IdentityWrite};
use bap_store::{Page, PageRequest, SortOrder, StoreError};
use bap_types::{BitcoinAddress, IdKey, Identity};

use crate::keys::{
    address_key, address_prefix, first_seen_key, id_key_from_first_seen, increment_prefix,
};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    pub(crate) fn read_identity(
        &self,
        rtxn: &RoTxn,
        id_key: &IdKey,
    ) -> Result<Option<Identity>, LmdbError> {
        match self.identities_db.get(rtxn, id_key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn remove_identity_indexes(&self, wtxn: &mut RwTxn, old: &Identity) -> Result<(), LmdbError> {
        let current = self
            .identity_current_db
            .get(wtxn, old.current_address.as_bytes())?;
        if current == Some(old.id_key.as_bytes()) {
            self.identity_current_db
                .delete(wtxn, old.current_address.as_bytes())?;
        }
        for entry in &old.addresses {
            self.identity_addresses_db
                .delete(wtxn, &address_key(&entry.address, &old.id_key))?;
        }
        self.identity_first_seen_db
            .delete(wtxn, &first_seen_key(old.first_seen, &old.id_key))?;
        Ok(())
    }

    fn write_identity(&self, wtxn: &mut RwTxn, identity: &Identity) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(identity)?;
        self.identities_db
            .put(wtxn, identity.id_key.as_bytes(), &bytes)?;
        let holder = self
            .identity_current_db
            .get(wtxn, identity.current_address.as_bytes())?;
        match holder {
            Some(owner) if owner != identity.id_key.as_bytes() => {
                warn!(
                    id_key = %identity.id_key,
                    address = %identity.current_address,
                    "current address already held by another identity"
                );
            }
            _ => self.identity_current_db.put(
                wtxn,
                identity.current_address.as_bytes(),
                identity.id_key.as_bytes(),
            )?,
        }
        for entry in &identity.addresses {
            self.identity_addresses_db
                .put(wtxn, &address_key(&entry.address, &identity.id_key), &[])?;
        }
        self.identity_first_seen_db.put(
            wtxn,
            &first_seen_key(identity.first_seen, &identity.id_key),
            &[],
        )?;
        Ok(())
    }
}

impl IdentityStore for LmdbEnvironment {
    fn find_identity(&self, id_key: &IdKey) -> Result<Option<Identity>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_identity(&rtxn, id_key)?)
    }

    fn find_by_current_address(
        &self,
        address: &BitcoinAddress,
    ) -> Result<Option<Identity>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(raw) = self
            .identity_current_db
            .get(&rtxn, address.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let id_key = IdKey::new(String::from_utf8_lossy(raw));
        let identity = self.read_identity(&rtxn, &id_key)?.ok_or_else(|| {
            StoreError::Corruption(format!("current address {address} points at missing {id_key}"))
        })?;
        Ok(Some(identity))
    }

    fn update_identity(&self, update: &IdentityUpdate) -> Result<IdentityWrite, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut slot = self.read_identity(&wtxn, update.id_key())?;
        let before = slot.clone();
        let outcome = apply_identity_update(&mut slot, update);
        if let (Some(after), true) = (slot.as_ref(), slot != before) {
            if let Some(old) = before.as_ref() {
                self.remove_identity_indexes(&mut wtxn, old)?;
            }
            self.write_identity(&mut wtxn, after)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(outcome)
    }

    fn put_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(old) = self.read_identity(&wtxn, &identity.id_key)? {
            self.remove_identity_indexes(&mut wtxn, &old)?;
        }
        self.write_identity(&mut wtxn, identity)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn find_by_address(&self, address: &BitcoinAddress) -> Result<Vec<Identity>, StoreError> {
        let prefix = address_prefix(address);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(prefix.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self
            .identity_addresses_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut keys = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            let raw = &key[prefix.len()..];
            keys.push(IdKey::new(String::from_utf8_lossy(raw)));
        }

        let mut results = Vec::with_capacity(keys.len());
        for id_key in keys {
            if let Some(identity) = self.read_identity(&rtxn, &id_key)? {
                results.push(identity);
            }
        }
        Ok(results)
    }

    fn list_identities(&self, page: &PageRequest) -> Result<Page<Identity>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let total = self
            .identities_db
            .len(&rtxn)
            .map_err(LmdbError::from)?;

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = page.limit as usize;
        let mut keys = Vec::with_capacity(limit);
        let mut collect = |entry: heed::Result<(&[u8], &[u8])>| -> Result<(), LmdbError> {
            let (key, _) = entry?;
            let id_key = id_key_from_first_seen(key)
                .ok_or_else(|| LmdbError::Serialization("malformed first_seen key".into()))?;
            keys.push(id_key);
            Ok(())
        };
        match page.order {
            SortOrder::Descending => {
                let iter = self
                    .identity_first_seen_db
                    .rev_iter(&rtxn)
                    .map_err(LmdbError::from)?;
                for entry in iter.skip(offset).take(limit) {
                    collect(entry)?;
                }
            }
            SortOrder::Ascending => {
                let iter = self
                    .identity_first_seen_db
                    .iter(&rtxn)
                    .map_err(LmdbError::from)?;
                for entry in iter.skip(offset).take(limit) {
                    collect(entry)?;
                }
            }
        }

        let mut items = Vec::with_capacity(keys.len());
        for id_key in &keys {
            let identity = self.read_identity(&rtxn, id_key)?.ok_or_else(|| {
                StoreError::Corruption(format!("first_seen index points at missing {id_key}"))
            })?;
            items.push(identity);
        }
        Ok(Page {
            items,
            total,
            offset: page.offset,
        })
    }

    fn identity_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.identities_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
