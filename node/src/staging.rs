//! Per-block staging: an overlay the applier writes into, and the JSONL files
//! the overlay is flushed to before the ingest worker replays them.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bap_store::{
    apply_attestation_update, apply_identity_update, AttestationStore, AttestationUpdate,
    AttestationWrite, DocumentStore, IdentityStore, IdentityUpdate, IdentityWrite, ProfileStore,
    StagedRecord, StoreError,
};
use bap_types::{Attestation, BitcoinAddress, BlockHeight, ClaimHash, IdKey, Identity, Profile};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum DocKey {
    Identity(IdKey),
    Attestation(ClaimHash),
    Profile(IdKey),
}

#[derive(Default)]
struct Touched {
    identities: HashMap<IdKey, Identity>,
    attestations: HashMap<ClaimHash, Attestation>,
    profiles: HashMap<IdKey, Profile>,
    order: Vec<DocKey>,
}

impl Touched {
    fn touch(&mut self, key: DocKey) {
        if !self.order.contains(&key) {
            self.order.push(key);
        }
    }
}

/// A document store that reads through to `base` and keeps every write in
/// memory. Reads of a touched document see the overlay's version.
pub struct StagingOverlay<S: ?Sized> {
    base: Arc<S>,
    touched: Mutex<Touched>,
}

impl<S: DocumentStore + ?Sized> StagingOverlay<S> {
    pub fn new(base: Arc<S>) -> Self {
        Self {
            base,
            touched: Mutex::new(Touched::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Touched>, StoreError> {
        self.touched
            .lock()
            .map_err(|_| StoreError::Backend("staging overlay lock poisoned".into()))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map(|t| t.order.is_empty()).unwrap_or(true)
    }

    /// Every touched document in first-touch order, at its latest version.
    pub fn into_records(self) -> Vec<StagedRecord> {
        let mut touched = match self.touched.into_inner() {
            Ok(touched) => touched,
            Err(poisoned) => poisoned.into_inner(),
        };
        let order = std::mem::take(&mut touched.order);
        order
            .into_iter()
            .filter_map(|key| match key {
                DocKey::Identity(k) => touched.identities.remove(&k).map(StagedRecord::Identity),
                DocKey::Attestation(k) => {
                    touched.attestations.remove(&k).map(StagedRecord::Attestation)
                }
                DocKey::Profile(k) => touched.profiles.remove(&k).map(StagedRecord::Profile),
            })
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> IdentityStore for StagingOverlay<S> {
    fn find_identity(&self, id_key: &IdKey) -> Result<Option<Identity>, StoreError> {
        if let Some(identity) = self.lock()?.identities.get(id_key) {
            return Ok(Some(identity.clone()));
        }
        self.base.find_identity(id_key)
    }

    fn find_by_current_address(
        &self,
        address: &BitcoinAddress,
    ) -> Result<Option<Identity>, StoreError> {
        let touched = self.lock()?;
        if let Some(identity) = touched
            .identities
            .values()
            .find(|identity| &identity.current_address == address)
        {
            return Ok(Some(identity.clone()));
        }
        // A base hit the overlay has since rotated away is stale.
        match self.base.find_by_current_address(address)? {
            Some(identity) if touched.identities.contains_key(&identity.id_key) => Ok(None),
            other => Ok(other),
        }
    }

    fn update_identity(&self, update: &IdentityUpdate) -> Result<IdentityWrite, StoreError> {
        let key = update.id_key().clone();
        let mut slot = self.find_identity(&key)?;
        let before = slot.clone();
        let write = apply_identity_update(&mut slot, update);
        if slot != before {
            if let Some(identity) = slot {
                let mut touched = self.lock()?;
                touched.identities.insert(key.clone(), identity);
                touched.touch(DocKey::Identity(key));
            }
        }
        Ok(write)
    }

    fn put_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut touched = self.lock()?;
        touched
            .identities
            .insert(identity.id_key.clone(), identity.clone());
        touched.touch(DocKey::Identity(identity.id_key.clone()));
        Ok(())
    }
}

impl<S: DocumentStore + ?Sized> AttestationStore for StagingOverlay<S> {
    fn find_attestation(&self, claim: &ClaimHash) -> Result<Option<Attestation>, StoreError> {
        if let Some(attestation) = self.lock()?.attestations.get(claim) {
            return Ok(Some(attestation.clone()));
        }
        self.base.find_attestation(claim)
    }

    fn update_attestation(
        &self,
        update: &AttestationUpdate,
    ) -> Result<AttestationWrite, StoreError> {
        let claim = *update.claim();
        let mut slot = self.find_attestation(&claim)?;
        let before = slot.clone();
        let write = apply_attestation_update(&mut slot, update);
        if slot != before {
            if let Some(attestation) = slot {
                let mut touched = self.lock()?;
                touched.attestations.insert(claim, attestation);
                touched.touch(DocKey::Attestation(claim));
            }
        }
        Ok(write)
    }

    fn put_attestation(&self, attestation: &Attestation) -> Result<(), StoreError> {
        let mut touched = self.lock()?;
        touched
            .attestations
            .insert(attestation.hash, attestation.clone());
        touched.touch(DocKey::Attestation(attestation.hash));
        Ok(())
    }
}

impl<S: DocumentStore + ?Sized> ProfileStore for StagingOverlay<S> {
    fn find_profile(&self, id_key: &IdKey) -> Result<Option<Profile>, StoreError> {
        if let Some(profile) = self.lock()?.profiles.get(id_key) {
            return Ok(Some(profile.clone()));
        }
        self.base.find_profile(id_key)
    }

    fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut touched = self.lock()?;
        touched
            .profiles
            .insert(profile.id_key.clone(), profile.clone());
        touched.touch(DocKey::Profile(profile.id_key.clone()));
        Ok(())
    }
}

/// Directory of `<height>.jsonl` staging files.
#[derive(Clone, Debug)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, height: BlockHeight) -> PathBuf {
        self.root.join(format!("{height}.jsonl"))
    }

    /// Write one record per line. The file appears under its final name
    /// only once fully written.
    pub fn write(&self, height: BlockHeight, records: &[StagedRecord]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(height);
        let tmp = self.root.join(format!("{height}.jsonl.tmp"));

        let file = File::create(&tmp)?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Staging files for heights above `checkpoint`, lowest first.
    pub fn pending_above(
        &self,
        checkpoint: Option<BlockHeight>,
    ) -> io::Result<Vec<(BlockHeight, PathBuf)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut pending = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(height) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<BlockHeight>().ok())
            else {
                continue;
            };
            if checkpoint.map_or(true, |c| height > c) {
                pending.push((height, path));
            }
        }
        pending.sort_by_key(|(height, _)| *height);
        Ok(pending)
    }

    /// Delete the file for `height`. A missing file is not an error.
    pub fn remove(&self, height: BlockHeight) -> io::Result<()> {
        match fs::remove_file(self.path_for(height)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_nullables::NullStore;
    use bap_types::{AddressEntry, BlockContext, Signer, Timestamp, TxHash};

    fn ctx(height: BlockHeight, tx: u8) -> BlockContext {
        BlockContext::new(height, Timestamp::new(u64::from(height)), TxHash::new([tx; 32]))
    }

    fn addr(s: &str) -> BitcoinAddress {
        BitcoinAddress::new(s)
    }

    fn identity(key: &str, address: &str, height: BlockHeight) -> Identity {
        Identity::create(IdKey::new(key), addr(address), &ctx(height, 1))
    }

    #[test]
    fn reads_fall_through_until_touched() {
        let base = Arc::new(NullStore::new());
        base.put_identity(&identity("alice", "1A", 10)).unwrap();
        let overlay = StagingOverlay::new(base.clone());

        assert!(overlay.find_by_current_address(&addr("1A")).unwrap().is_some());
        assert!(overlay.is_empty());

        let rotate = IdentityUpdate::Rotate {
            id_key: IdKey::new("alice"),
            entry: AddressEntry::new(addr("1B"), &ctx(11, 2)),
        };
        assert_eq!(
            overlay.update_identity(&rotate).unwrap(),
            IdentityWrite::Rotated { appended: true }
        );

        // The base still says 1A; the overlay has moved on.
        assert!(overlay.find_by_current_address(&addr("1A")).unwrap().is_none());
        assert_eq!(
            overlay
                .find_by_current_address(&addr("1B"))
                .unwrap()
                .unwrap()
                .id_key,
            IdKey::new("alice")
        );
        assert_eq!(
            base.find_identity(&IdKey::new("alice")).unwrap().unwrap().current_address,
            addr("1A")
        );
    }

    #[test]
    fn records_come_out_in_first_touch_order_at_latest_version() {
        let overlay = StagingOverlay::new(Arc::new(NullStore::new()));
        let claim = ClaimHash::new([7; 32]);
        let sign = |seq| AttestationUpdate::Sign {
            claim,
            signer: Signer::new(IdKey::new("alice"), addr("1A"), seq, &ctx(10, 3)),
        };

        overlay
            .update_identity(&IdentityUpdate::Create(identity("alice", "1A", 10)))
            .unwrap();
        overlay.update_attestation(&sign(1)).unwrap();
        overlay.update_attestation(&sign(2)).unwrap();

        let records = overlay.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].collection(), "identity");
        match &records[1] {
            StagedRecord::Attestation(att) => assert_eq!(att.signers[0].sequence, 2),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn no_op_updates_do_not_touch() {
        let base = Arc::new(NullStore::new());
        base.put_identity(&identity("alice", "1A", 10)).unwrap();
        let overlay = StagingOverlay::new(base);

        let write = overlay
            .update_identity(&IdentityUpdate::Create(identity("alice", "1A", 10)))
            .unwrap();
        assert_eq!(write, IdentityWrite::Duplicate);
        let revoke = AttestationUpdate::Revoke {
            claim: ClaimHash::new([1; 32]),
            id_key: IdKey::new("alice"),
            sequence: 1,
        };
        assert_eq!(
            overlay.update_attestation(&revoke).unwrap(),
            AttestationWrite::Missing
        );
        assert!(overlay.into_records().is_empty());
    }

    #[test]
    fn staging_files_round_trip_and_list_in_height_order() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(dir.path().join("staging"));
        assert!(staging.pending_above(None).unwrap().is_empty());

        let records = vec![StagedRecord::Identity(identity("alice", "1A", 10))];
        for height in [12, 10, 11] {
            staging.write(height, &records).unwrap();
        }
        fs::write(staging.root().join("notes.txt"), "x").unwrap();

        let pending = staging.pending_above(Some(10)).unwrap();
        let heights: Vec<_> = pending.iter().map(|(h, _)| *h).collect();
        assert_eq!(heights, vec![11, 12]);

        let line = fs::read_to_string(staging.path_for(12)).unwrap();
        let back: StagedRecord = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back, records[0]);

        staging.remove(12).unwrap();
        staging.remove(12).unwrap();
        assert_eq!(staging.pending_above(None).unwrap().len(), 2);
    }
}
