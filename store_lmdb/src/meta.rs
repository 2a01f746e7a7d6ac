//! LMDB implementation of MetaStore, ProgressStore and FailedBlockStore.
//!
//! All three share the `meta` database:
//! - `schema_version` → u32 LE
//! - `progress` → u32 LE, the last fully ingested block height
//! - `failed_block:` ++ height BE → bincode `FailedBlock`

use std::ops::Bound;

use bap_store::meta::{FailedBlock, FailedBlockStore, MetaStore};
use bap_store::progress::ProgressStore;
use bap_store::StoreError;
use bap_types::BlockHeight;

use crate::keys::increment_prefix;
use crate::{LmdbEnvironment, LmdbError};

const SCHEMA_VERSION_KEY: &str = "schema_version";
const PROGRESS_KEY: &str = "progress";
const FAILED_BLOCK_PREFIX: &[u8] = b"failed_block:";

fn failed_block_key(height: BlockHeight) -> Vec<u8> {
    let mut key = FAILED_BLOCK_PREFIX.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn decode_u32(key: &str, bytes: &[u8]) -> Result<u32, LmdbError> {
    let arr: [u8; 4] = bytes.try_into().map_err(|_| {
        LmdbError::Serialization(format!("{key} has unexpected byte length {}", bytes.len()))
    })?;
    Ok(u32::from_le_bytes(arr))
}

impl LmdbEnvironment {
    fn get_meta_opt(&self, key: &str) -> Result<Option<Vec<u8>>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.meta_db.get(&rtxn, key.as_bytes())?.map(<[u8]>::to_vec))
    }
}

impl MetaStore for LmdbEnvironment {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let value = self
            .get_meta_opt(key)?
            .ok_or_else(|| LmdbError::NotFound(format!("meta key '{}'", key)))?;
        Ok(value)
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta_opt(SCHEMA_VERSION_KEY)? {
            Some(bytes) => Ok(decode_u32(SCHEMA_VERSION_KEY, &bytes)?),
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}

impl ProgressStore for LmdbEnvironment {
    fn load_progress(&self) -> Result<Option<BlockHeight>, StoreError> {
        match self.get_meta_opt(PROGRESS_KEY)? {
            Some(bytes) => Ok(Some(decode_u32(PROGRESS_KEY, &bytes)?)),
            None => Ok(None),
        }
    }

    fn save_progress(&self, height: BlockHeight) -> Result<(), StoreError> {
        self.put_meta(PROGRESS_KEY, &height.to_le_bytes())
    }
}

impl FailedBlockStore for LmdbEnvironment {
    fn record_failed_block(&self, block: &FailedBlock) -> Result<(), StoreError> {
        let bytes = bincode::serialize(block).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, &failed_block_key(block.height), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn failed_blocks(&self) -> Result<Vec<FailedBlock>, StoreError> {
        let mut upper = FAILED_BLOCK_PREFIX.to_vec();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(FAILED_BLOCK_PREFIX),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self
            .meta_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(results)
    }
}
