use bap_types::{ClaimHash, IdKey, TxHash};
use thiserror::Error;

/// Failures that must stop ingestion. Recoverable conditions (orphans,
/// stale operations, bad profile JSON) are reported as outcomes instead.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ALIAS in {txid} names identity {op_key} but was signed by identity {signer_key}")]
    AliasKeyMismatch {
        txid: TxHash,
        signer_key: IdKey,
        op_key: IdKey,
    },

    #[error("REVOKE of {claim} in {txid} has no signing identity")]
    OrphanRevoke { txid: TxHash, claim: ClaimHash },

    #[error("storage error: {0}")]
    Storage(#[from] bap_store::StoreError),
}
