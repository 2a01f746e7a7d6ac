//! Metadata storage traits.

use bap_types::{BlockHeight, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Trait for storing database metadata (schema version and other bookkeeping).
///
/// This is a generic key-value store for internal bookkeeping that doesn't
/// belong in any domain-specific store.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value. Missing keys are `StoreError::NotFound`.
    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}

/// A block the indexer gave up on after exhausting its retry budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBlock {
    pub height: BlockHeight,
    pub attempts: u32,
    pub reason: String,
    pub recorded_at: Timestamp,
}

/// Operator-visible log of skipped blocks.
pub trait FailedBlockStore {
    fn record_failed_block(&self, block: &FailedBlock) -> Result<(), StoreError>;

    /// All recorded failures in height order.
    fn failed_blocks(&self) -> Result<Vec<FailedBlock>, StoreError>;
}
