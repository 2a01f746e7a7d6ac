//! Durable last-completed block height.

use std::sync::Arc;

use bap_store::{IndexStore, StoreError};
use bap_types::BlockHeight;
use tracing::debug;

/// Reads and writes the ingestion checkpoint through the store's progress
/// record. `floor` is the configured start height.
#[derive(Clone)]
pub struct Checkpoint {
    store: Arc<dyn IndexStore>,
    floor: BlockHeight,
}

impl Checkpoint {
    pub fn new(store: Arc<dyn IndexStore>, floor: BlockHeight) -> Self {
        Self { store, floor }
    }

    pub fn floor(&self) -> BlockHeight {
        self.floor
    }

    /// The stored height, if any block has completed.
    pub fn stored(&self) -> Result<Option<BlockHeight>, StoreError> {
        self.store.load_progress()
    }

    /// The stored height, or the floor when nothing is stored.
    pub fn load(&self) -> Result<BlockHeight, StoreError> {
        Ok(self.stored()?.unwrap_or(self.floor))
    }

    /// Where a fresh subscription starts: `max(floor, checkpoint)`.
    ///
    /// The checkpoint block itself is requested again; re-applying it is a
    /// no-op.
    pub fn resume_height(&self) -> Result<BlockHeight, StoreError> {
        Ok(self.load()?.max(self.floor))
    }

    /// Overwrite the stored height.
    pub fn save(&self, height: BlockHeight) -> Result<(), StoreError> {
        self.store.save_progress(height)?;
        debug!(height, "checkpoint saved");
        Ok(())
    }
}
