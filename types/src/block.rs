//! Block height and the per-transaction block context passed to the applier.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, TxHash};

/// Height of a mined block. Unconfirmed transactions use height 0.
pub type BlockHeight = u32;

/// Where a transaction was seen: its block height, block time and txid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: BlockHeight,
    pub time: Timestamp,
    pub txid: TxHash,
}

impl BlockContext {
    pub fn new(height: BlockHeight, time: Timestamp, txid: TxHash) -> Self {
        Self { height, time, txid }
    }

    /// Context for an unconfirmed transaction.
    pub fn mempool(txid: TxHash) -> Self {
        Self {
            height: 0,
            time: Timestamp::EPOCH,
            txid,
        }
    }

    pub fn is_mempool(&self) -> bool {
        self.height == 0
    }
}
