use thiserror::Error;

use crate::ingest::IngestError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] bap_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] bap_store::StoreError),

    #[error("feed error: {0}")]
    Feed(#[from] bap_network::FeedError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(String),

    #[error("{0}")]
    Other(String),
}

impl From<bap_store_lmdb::LmdbError> for NodeError {
    fn from(e: bap_store_lmdb::LmdbError) -> Self {
        NodeError::Store(e.into())
    }
}
