//! Staged records: whole-document upserts replayed by the ingest worker.

use bap_types::{Attestation, Identity, Profile};
use serde::{Deserialize, Serialize};

use crate::{AttestationStore, IdentityStore, ProfileStore, StoreError};

/// One document upsert, tagged with the collection it belongs to.
///
/// Serialized as the document's own fields plus `"collection"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "lowercase")]
pub enum StagedRecord {
    Identity(Identity),
    Attestation(Attestation),
    Profile(Profile),
}

impl StagedRecord {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Identity(_) => "identity",
            Self::Attestation(_) => "attestation",
            Self::Profile(_) => "profile",
        }
    }

    /// Records sharing a lane key must be persisted in order.
    pub fn lane_key(&self) -> String {
        let key = match self {
            Self::Identity(doc) => doc.id_key.to_string(),
            Self::Attestation(doc) => doc.hash.to_string(),
            Self::Profile(doc) => doc.id_key.to_string(),
        };
        format!("{}/{}", self.collection(), key)
    }

    /// Upsert the wrapped document. Replaying a record is idempotent.
    pub fn persist<S>(&self, store: &S) -> Result<(), StoreError>
    where
        S: IdentityStore + AttestationStore + ProfileStore + ?Sized,
    {
        match self {
            Self::Identity(doc) => store.put_identity(doc),
            Self::Attestation(doc) => store.put_attestation(doc),
            Self::Profile(doc) => store.put_profile(doc),
        }
    }
}
