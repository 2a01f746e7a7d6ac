//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the indexer begins
//! ingesting blocks.

use std::path::Path;

use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Database names that we expect to exist in a valid indexer environment.
pub const EXPECTED_DATABASES: &[&str] = &[
    "identities",
    "identity_current",
    "identity_addresses",
    "identity_first_seen",
    "attestations",
    "profiles",
    "meta",
];

/// Check LMDB database integrity on startup.
///
/// Opens each expected database and counts entries, then checks that the
/// first-seen index covers every identity. Read failures are recorded in
/// the report rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env.read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env
            .env
            .open_database::<heed::types::Bytes, heed::types::Bytes>(&rtxn, Some(db_name))
        {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    let identities = env.identities_db.len(&rtxn)?;
    let first_seen = env.identity_first_seen_db.len(&rtxn)?;
    if identities != first_seen {
        report.errors.push(format!(
            "first_seen index has {} entries for {} identities",
            first_seen, identities
        ));
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent or empty) directory. Returns an
/// error if the directory has content but `data.mdb` is missing, which
/// suggests corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if data_file.exists() {
        return Ok(());
    }
    let empty = std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        return Ok(());
    }
    Err(format!(
        "LMDB directory exists but data.mdb is missing at {}",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_store::{IdentityStore, IdentityUpdate};
    use bap_types::{BitcoinAddress, BlockContext, IdKey, Identity, Timestamp, TxHash};

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("missing")).is_ok());
        assert!(check_data_dir(dir.path()).is_ok());
    }

    #[test]
    fn check_data_dir_without_data_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lock.mdb"), b"").unwrap();
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn populated_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let ctx = BlockContext::new(1, Timestamp::new(1), TxHash::ZERO);
        env.update_identity(&IdentityUpdate::Create(Identity::create(
            IdKey::new("X"),
            BitcoinAddress::new("1A1111111111111111111111111"),
            &ctx,
        )))
        .unwrap();

        let report = check_integrity(&env).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked, EXPECTED_DATABASES.len() as u32);
        assert!(report.total_entries >= 4);
    }
}
