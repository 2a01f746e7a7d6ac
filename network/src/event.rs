use std::fmt;

use bap_types::{BlockContext, BlockHeight, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

/// A raw transaction delivered by the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedTransaction {
    pub id: TxHash,
    /// Zero for unconfirmed transactions.
    pub height: BlockHeight,
    pub time: Timestamp,
    pub raw: Vec<u8>,
}

impl FeedTransaction {
    pub fn context(&self) -> BlockContext {
        BlockContext::new(self.height, self.time, self.id)
    }
}

/// Subscription status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    Connected,
    Disconnected,
    /// Every transaction of `height` has been delivered.
    BlockDone,
    /// Caught up with the chain tip.
    Waiting,
    Reorg,
    #[serde(other)]
    Unknown,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::BlockDone => "block-done",
            Self::Waiting => "waiting",
            Self::Reorg => "reorg",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    Transaction(FeedTransaction),
    Mempool(FeedTransaction),
    Status { kind: StatusKind, height: BlockHeight },
    Error(String),
}

impl FeedEvent {
    pub fn status(kind: StatusKind, height: BlockHeight) -> Self {
        Self::Status { kind, height }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Mempool(_) => "mempool",
            Self::Status { .. } => "status",
            Self::Error(_) => "error",
        }
    }
}
