use std::sync::Arc;

use bap_store::IndexStore;
use bap_types::BlockHeight;
use serde::{Deserialize, Serialize};

/// What the running indexer exposes to the API.
pub trait IndexerControl: Send + Sync + 'static {
    fn status(&self) -> IndexerStatus;

    /// Restart the feed subscription at `height`.
    fn request_resync(&self, height: BlockHeight) -> Result<(), String>;

    /// Prometheus text exposition.
    fn metrics_text(&self) -> String;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    pub state: String,
    pub subscribed_from: BlockHeight,
    pub block_transactions: u64,
    pub checkpoint: Option<BlockHeight>,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct RpcState {
    pub store: Arc<dyn IndexStore>,
    pub control: Arc<dyn IndexerControl>,
}

impl RpcState {
    pub fn new(store: Arc<dyn IndexStore>, control: Arc<dyn IndexerControl>) -> Self {
        Self { store, control }
    }
}
