//! Profile document set by ALIAS operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BlockContext, BlockHeight, IdKey, Timestamp, TxHash};

/// Free-form profile data for an identity. Each ALIAS replaces it whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id_key: IdKey,
    pub data: Map<String, Value>,
    pub block: BlockHeight,
    #[serde(rename = "txId")]
    pub txid: TxHash,
    pub timestamp: Timestamp,
}

impl Profile {
    pub fn new(id_key: IdKey, data: Map<String, Value>, ctx: &BlockContext) -> Self {
        Self {
            id_key,
            data,
            block: ctx.height,
            txid: ctx.txid,
            timestamp: ctx.time,
        }
    }
}
