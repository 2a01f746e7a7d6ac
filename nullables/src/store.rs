//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bap_store::{
    apply_attestation_update, apply_identity_update, AttestationStore, AttestationUpdate,
    AttestationWrite, FailedBlock, FailedBlockStore, IdentityStore, IdentityUpdate,
    IdentityWrite, Page, PageRequest, ProfileStore, ProgressStore, SortOrder, StoreError,
};
use bap_types::{Attestation, BitcoinAddress, BlockHeight, ClaimHash, IdKey, Identity, Profile};

/// The three document collections at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreSnapshot {
    pub identities: BTreeMap<IdKey, Identity>,
    pub attestations: BTreeMap<ClaimHash, Attestation>,
    pub profiles: BTreeMap<IdKey, Profile>,
}

#[derive(Default)]
struct State {
    docs: StoreSnapshot,
    progress: Option<BlockHeight>,
    failed: BTreeMap<BlockHeight, FailedBlock>,
}

/// An in-memory implementation of every store trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a NullStore);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_writes: AtomicBool::new(false),
            write_delay: Mutex::new(None),
            writes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold each whole-document write for `delay`, so concurrent writers overlap.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock().unwrap() = delay;
    }

    /// Successful write calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Most whole-document writes observed running at once.
    pub fn peak_concurrent_writes(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().docs.clone()
    }

    fn begin_write(&self) -> Result<InFlight<'_>, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(InFlight(self))
    }

    /// Like `begin_write`, plus the configured delay. Used by whole-document
    /// puts, which is what the bulk ingest path calls.
    fn begin_put(&self) -> Result<InFlight<'_>, StoreError> {
        let guard = self.begin_write()?;
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(guard)
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for NullStore {
    fn find_identity(&self, id_key: &IdKey) -> Result<Option<Identity>, StoreError> {
        Ok(self.lock().docs.identities.get(id_key).cloned())
    }

    fn find_by_current_address(
        &self,
        address: &BitcoinAddress,
    ) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .lock()
            .docs
            .identities
            .values()
            .find(|identity| &identity.current_address == address)
            .cloned())
    }

    fn update_identity(&self, update: &IdentityUpdate) -> Result<IdentityWrite, StoreError> {
        let _guard = self.begin_write()?;
        let mut state = self.lock();
        let key = update.id_key().clone();
        let mut slot = state.docs.identities.get(&key).cloned();
        let write = apply_identity_update(&mut slot, update);
        if let Some(identity) = slot {
            state.docs.identities.insert(key, identity);
        }
        Ok(write)
    }

    fn put_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let _guard = self.begin_put()?;
        self.lock()
            .docs
            .identities
            .insert(identity.id_key.clone(), identity.clone());
        Ok(())
    }

    fn find_by_address(&self, address: &BitcoinAddress) -> Result<Vec<Identity>, StoreError> {
        Ok(self
            .lock()
            .docs
            .identities
            .values()
            .filter(|identity| identity.has_used(address))
            .cloned()
            .collect())
    }

    fn list_identities(&self, page: &PageRequest) -> Result<Page<Identity>, StoreError> {
        let state = self.lock();
        let mut all: Vec<&Identity> = state.docs.identities.values().collect();
        all.sort_by(|a, b| (a.first_seen, &a.id_key).cmp(&(b.first_seen, &b.id_key)));
        if page.order == SortOrder::Descending {
            all.reverse();
        }
        let items = all
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            total: state.docs.identities.len() as u64,
            offset: page.offset,
        })
    }

    fn identity_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().docs.identities.len() as u64)
    }
}

impl AttestationStore for NullStore {
    fn find_attestation(&self, claim: &ClaimHash) -> Result<Option<Attestation>, StoreError> {
        Ok(self.lock().docs.attestations.get(claim).cloned())
    }

    fn update_attestation(
        &self,
        update: &AttestationUpdate,
    ) -> Result<AttestationWrite, StoreError> {
        let _guard = self.begin_write()?;
        let mut state = self.lock();
        let claim = *update.claim();
        let mut slot = state.docs.attestations.get(&claim).cloned();
        let write = apply_attestation_update(&mut slot, update);
        if let Some(attestation) = slot {
            state.docs.attestations.insert(claim, attestation);
        }
        Ok(write)
    }

    fn put_attestation(&self, attestation: &Attestation) -> Result<(), StoreError> {
        let _guard = self.begin_put()?;
        self.lock()
            .docs
            .attestations
            .insert(attestation.hash, attestation.clone());
        Ok(())
    }

    fn attestation_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().docs.attestations.len() as u64)
    }
}

impl ProfileStore for NullStore {
    fn find_profile(&self, id_key: &IdKey) -> Result<Option<Profile>, StoreError> {
        Ok(self.lock().docs.profiles.get(id_key).cloned())
    }

    fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let _guard = self.begin_put()?;
        self.lock()
            .docs
            .profiles
            .insert(profile.id_key.clone(), profile.clone());
        Ok(())
    }

    fn profile_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().docs.profiles.len() as u64)
    }
}

impl ProgressStore for NullStore {
    fn load_progress(&self) -> Result<Option<BlockHeight>, StoreError> {
        Ok(self.lock().progress)
    }

    fn save_progress(&self, height: BlockHeight) -> Result<(), StoreError> {
        let _guard = self.begin_write()?;
        self.lock().progress = Some(height);
        Ok(())
    }
}

impl FailedBlockStore for NullStore {
    fn record_failed_block(&self, block: &FailedBlock) -> Result<(), StoreError> {
        let _guard = self.begin_write()?;
        self.lock().failed.insert(block.height, block.clone());
        Ok(())
    }

    fn failed_blocks(&self) -> Result<Vec<FailedBlock>, StoreError> {
        Ok(self.lock().failed.values().cloned().collect())
    }
}
