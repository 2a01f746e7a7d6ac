//! Ingestion progress (checkpoint) storage trait.

use bap_types::BlockHeight;

use crate::StoreError;

/// Durable record of the last fully ingested block height.
pub trait ProgressStore {
    /// `None` when no block has been completed yet.
    fn load_progress(&self) -> Result<Option<BlockHeight>, StoreError>;

    /// Overwrite the stored height.
    fn save_progress(&self, height: BlockHeight) -> Result<(), StoreError>;
}
