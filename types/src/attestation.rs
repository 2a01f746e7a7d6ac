//! Attestation document: the set of identities that signed a claim.

use serde::{Deserialize, Serialize};

use crate::{BitcoinAddress, BlockContext, BlockHeight, ClaimHash, IdKey, Timestamp, TxHash};

/// One identity's signature over a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    pub id_key: IdKey,
    #[serde(rename = "signingAddress")]
    pub address: BitcoinAddress,
    #[serde(rename = "txId")]
    pub txid: TxHash,
    pub block: BlockHeight,
    pub timestamp: Timestamp,
    pub sequence: u64,
    #[serde(default)]
    pub revoked: bool,
}

impl Signer {
    pub fn new(id_key: IdKey, address: BitcoinAddress, sequence: u64, ctx: &BlockContext) -> Self {
        Self {
            id_key,
            address,
            txid: ctx.txid,
            block: ctx.height,
            timestamp: ctx.time,
            sequence,
            revoked: false,
        }
    }
}

/// What happened to the signer array when a new signature was offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignerChange {
    /// No entry for this identity existed; the signer was appended.
    Added,
    /// The stored entry had a lower sequence and was replaced in place.
    Replaced { previous: u64 },
    /// The stored entry's sequence was equal or higher; nothing changed.
    Rejected { stored: u64 },
}

/// Attestation keyed by claim hash, holding at most one signer per identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub hash: ClaimHash,
    pub signers: Vec<Signer>,
}

impl Attestation {
    pub fn new(hash: ClaimHash, first: Signer) -> Self {
        Self {
            hash,
            signers: vec![first],
        }
    }

    pub fn signer_for(&self, id_key: &IdKey) -> Option<&Signer> {
        self.signers.iter().find(|s| &s.id_key == id_key)
    }

    /// Offer a signer. Replaces an existing entry for the same identity only
    /// when the new sequence is strictly greater.
    pub fn offer(&mut self, signer: Signer) -> SignerChange {
        match self.signers.iter_mut().find(|s| s.id_key == signer.id_key) {
            Some(stored) if signer.sequence > stored.sequence => {
                let previous = stored.sequence;
                *stored = signer;
                SignerChange::Replaced { previous }
            }
            Some(stored) => SignerChange::Rejected {
                stored: stored.sequence,
            },
            None => {
                self.signers.push(signer);
                SignerChange::Added
            }
        }
    }

    /// Remove the identity's entries whose sequence is at or below
    /// `sequence`. Returns how many were removed.
    pub fn revoke(&mut self, id_key: &IdKey, sequence: u64) -> usize {
        let before = self.signers.len();
        self.signers
            .retain(|s| !(&s.id_key == id_key && s.sequence <= sequence));
        before - self.signers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(id: &str, seq: u64) -> Signer {
        let ctx = BlockContext::new(200, Timestamp::new(1), TxHash::new([seq as u8; 32]));
        Signer::new(
            IdKey::new(id),
            BitcoinAddress::new("1A1111111111111111111111111"),
            seq,
            &ctx,
        )
    }

    fn claim() -> ClaimHash {
        ClaimHash::new([7u8; 32])
    }

    #[test]
    fn higher_sequence_replaces() {
        let mut att = Attestation::new(claim(), signer("X", 0));
        assert_eq!(att.offer(signer("X", 1)), SignerChange::Replaced { previous: 0 });
        assert_eq!(att.signers.len(), 1);
        assert_eq!(att.signer_for(&IdKey::new("X")).unwrap().sequence, 1);
    }

    #[test]
    fn equal_or_lower_sequence_is_rejected() {
        let mut att = Attestation::new(claim(), signer("X", 3));
        assert_eq!(att.offer(signer("X", 3)), SignerChange::Rejected { stored: 3 });
        assert_eq!(att.offer(signer("X", 1)), SignerChange::Rejected { stored: 3 });
        assert_eq!(att.signer_for(&IdKey::new("X")).unwrap().sequence, 3);
    }

    #[test]
    fn new_identity_is_appended() {
        let mut att = Attestation::new(claim(), signer("X", 0));
        assert_eq!(att.offer(signer("Y", 0)), SignerChange::Added);
        assert_eq!(att.signers.len(), 2);
    }

    #[test]
    fn revoke_removes_only_that_identity() {
        let mut att = Attestation::new(claim(), signer("X", 1));
        att.offer(signer("Y", 0));
        assert_eq!(att.revoke(&IdKey::new("X"), 1), 1);
        assert!(att.signer_for(&IdKey::new("X")).is_none());
        assert!(att.signer_for(&IdKey::new("Y")).is_some());
    }

    #[test]
    fn revoke_below_stored_sequence_keeps_entry() {
        let mut att = Attestation::new(claim(), signer("X", 5));
        assert_eq!(att.revoke(&IdKey::new("X"), 4), 0);
        assert_eq!(att.signers.len(), 1);
    }
}
