//! Abstract storage traits for the BAP indexer.
//!
//! Every storage backend (LMDB, in-memory for testing, the per-block staging
//! overlay) implements these traits. The rest of the codebase depends only on
//! the traits.

pub mod attestation;
pub mod error;
pub mod identity;
pub mod meta;
pub mod paging;
pub mod profile;
pub mod progress;
pub mod record;

pub use attestation::{apply_attestation_update, AttestationStore, AttestationUpdate, AttestationWrite};
pub use error::StoreError;
pub use identity::{apply_identity_update, IdentityStore, IdentityUpdate, IdentityWrite};
pub use meta::{FailedBlock, FailedBlockStore, MetaStore};
pub use paging::{Page, PageRequest, SortOrder};
pub use profile::ProfileStore;
pub use progress::ProgressStore;
pub use record::StagedRecord;

/// The three document collections the state applier reads and writes.
pub trait DocumentStore: IdentityStore + AttestationStore + ProfileStore {}

impl<T: IdentityStore + AttestationStore + ProfileStore + ?Sized> DocumentStore for T {}

/// Everything the running indexer needs from its persistent backend.
pub trait IndexStore:
    DocumentStore + ProgressStore + FailedBlockStore + Send + Sync + 'static
{
}

impl<T> IndexStore for T where
    T: DocumentStore + ProgressStore + FailedBlockStore + Send + Sync + 'static
{
}
