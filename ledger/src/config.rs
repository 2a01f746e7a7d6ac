use serde::{Deserialize, Serialize};

/// What to do with an operation whose signer resolves to no identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Log and continue.
    #[default]
    Skip,
    /// Stop ingestion with an error.
    Fail,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplierConfig {
    pub orphan_revoke: OrphanPolicy,
}
