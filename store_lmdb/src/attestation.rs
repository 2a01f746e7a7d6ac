//! LMDB implementation of AttestationStore.

use heed::RoTxn;

use bap_store::attestation::{
    apply_attestation_update, AttestationStore, AttestationUpdate, AttestationWrite,
};
use bap_store::StoreError;
use bap_types::{Attestation, ClaimHash};

use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    fn read_attestation(
        &self,
        rtxn: &RoTxn,
        claim: &ClaimHash,
    ) -> Result<Option<Attestation>, LmdbError> {
        match self.attestations_db.get(rtxn, claim.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }
}

impl AttestationStore for LmdbEnvironment {
    fn find_attestation(&self, claim: &ClaimHash) -> Result<Option<Attestation>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_attestation(&rtxn, claim)?)
    }

    fn update_attestation(
        &self,
        update: &AttestationUpdate,
    ) -> Result<AttestationWrite, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut slot = self.read_attestation(&wtxn, update.claim())?;
        let before = slot.clone();
        let outcome = apply_attestation_update(&mut slot, update);
        if let (Some(after), true) = (slot.as_ref(), slot != before) {
            let bytes = bincode::serialize(after).map_err(LmdbError::from)?;
            self.attestations_db
                .put(&mut wtxn, after.hash.as_bytes(), &bytes)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(outcome)
    }

    fn put_attestation(&self, attestation: &Attestation) -> Result<(), StoreError> {
        let bytes = bincode::serialize(attestation).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.attestations_db
            .put(&mut wtxn, attestation.hash.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn attestation_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.attestations_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_types::attestation::SignerChange;
    use bap_types::{BitcoinAddress, BlockContext, IdKey, Signer, Timestamp, TxHash};

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).expect("failed to open env");
        (dir, env)
    }

    fn sign(id: &str, seq: u64) -> AttestationUpdate {
        let ctx = BlockContext::new(10, Timestamp::new(1), TxHash::new([seq as u8; 32]));
        AttestationUpdate::Sign {
            claim: ClaimHash::new([4u8; 32]),
            signer: Signer::new(
                IdKey::new(id),
                BitcoinAddress::new("1A1111111111111111111111111"),
                seq,
                &ctx,
            ),
        }
    }

    #[test]
    fn sign_create_replace_reject() {
        let (_dir, store) = temp_env();
        assert_eq!(store.update_attestation(&sign("X", 0)).unwrap(), AttestationWrite::Created);
        assert_eq!(
            store.update_attestation(&sign("X", 1)).unwrap(),
            AttestationWrite::Signer(SignerChange::Replaced { previous: 0 })
        );
        assert_eq!(
            store.update_attestation(&sign("X", 1)).unwrap(),
            AttestationWrite::Signer(SignerChange::Rejected { stored: 1 })
        );
        let att = store.find_attestation(&ClaimHash::new([4u8; 32])).unwrap().unwrap();
        assert_eq!(att.signers.len(), 1);
        assert_eq!(att.signers[0].sequence, 1);
    }

    #[test]
    fn revoke_pulls_signer() {
        let (_dir, store) = temp_env();
        store.update_attestation(&sign("X", 1)).unwrap();
        store.update_attestation(&sign("Y", 0)).unwrap();
        let revoke = AttestationUpdate::Revoke {
            claim: ClaimHash::new([4u8; 32]),
            id_key: IdKey::new("X"),
            sequence: 1,
        };
        assert_eq!(store.update_attestation(&revoke).unwrap(), AttestationWrite::Revoked(1));
        let att = store.find_attestation(&ClaimHash::new([4u8; 32])).unwrap().unwrap();
        assert_eq!(att.signers.len(), 1);
        assert_eq!(att.signers[0].id_key, IdKey::new("Y"));
    }

    #[test]
    fn revoke_without_attestation_is_missing() {
        let (_dir, store) = temp_env();
        let revoke = AttestationUpdate::Revoke {
            claim: ClaimHash::new([9u8; 32]),
            id_key: IdKey::new("X"),
            sequence: 1,
        };
        assert_eq!(store.update_attestation(&revoke).unwrap(), AttestationWrite::Missing);
        assert_eq!(store.attestation_count().unwrap(), 0);
    }
}
