//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::migration::Migrator;
use crate::LmdbError;

/// Number of named databases the indexer creates.
pub const MAX_DBS: u32 = 8;

/// Default map size: 16 GiB of address space. LMDB only uses what it writes.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
///
/// Every store trait is implemented directly on this type, one module per
/// trait. Writes that touch a document and its indexes share one write
/// transaction.
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    /// idKey → bincode `Identity`
    pub(crate) identities_db: Database<Bytes, Bytes>,
    /// current address → idKey
    pub(crate) identity_current_db: Database<Bytes, Bytes>,
    /// address ++ 0x00 ++ idKey → ()
    pub(crate) identity_addresses_db: Database<Bytes, Bytes>,
    /// first-seen height (BE) ++ idKey → ()
    pub(crate) identity_first_seen_db: Database<Bytes, Bytes>,
    /// claim hash → bincode `Attestation`
    pub(crate) attestations_db: Database<Bytes, Bytes>,
    /// idKey → JSON `Profile`
    pub(crate) profiles_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, creating any
    /// missing databases and migrating the schema.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the indexer opens each environment path exactly once per
        // process and never mutates the memory map outside heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let identities_db = env.create_database(&mut wtxn, Some("identities"))?;
        let identity_current_db = env.create_database(&mut wtxn, Some("identity_current"))?;
        let identity_addresses_db = env.create_database(&mut wtxn, Some("identity_addresses"))?;
        let identity_first_seen_db = env.create_database(&mut wtxn, Some("identity_first_seen"))?;
        let attestations_db = env.create_database(&mut wtxn, Some("attestations"))?;
        let profiles_db = env.create_database(&mut wtxn, Some("profiles"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            identities_db,
            identity_current_db,
            identity_addresses_db,
            identity_first_seen_db,
            attestations_db,
            profiles_db,
            meta_db,
        };
        Migrator::run(&environment)?;
        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");
        Ok(environment)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Flush buffers to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
