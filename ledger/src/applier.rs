use bap_store::{
    AttestationUpdate, AttestationWrite, DocumentStore, IdentityUpdate, IdentityWrite,
    StoreError,
};
use bap_types::attestation::SignerChange;
use bap_types::{
    AddressEntry, BapOperation, BitcoinAddress, BlockContext, ClaimHash, IdKey, Identity,
    OperationKind, OperationPair, Profile, Signer,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ApplierConfig, ApplyOutcome, LedgerError, OrphanPolicy};

/// Applies validated operation pairs to a document store.
///
/// Every rule is idempotent: delivering the same pair twice leaves the store
/// as the first delivery did.
#[derive(Clone, Debug, Default)]
pub struct StateApplier {
    config: ApplierConfig,
}

impl StateApplier {
    pub fn new(config: ApplierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApplierConfig {
        &self.config
    }

    /// Apply one pair. `ctx` carries the block height and time of the
    /// containing transaction (both zero for mempool transactions).
    pub fn apply<S>(
        &self,
        store: &S,
        pair: &OperationPair,
        ctx: &BlockContext,
    ) -> Result<ApplyOutcome, LedgerError>
    where
        S: DocumentStore + ?Sized,
    {
        let signer = pair.signer();
        let identity = store.find_by_current_address(signer)?;

        let outcome = match &pair.operation {
            BapOperation::Id { id_key, address } => {
                self.apply_id(store, identity, id_key, address, signer, ctx)?
            }
            BapOperation::Attest { claim, sequence } => match identity {
                Some(identity) => {
                    self.apply_attest(store, identity.id_key, claim, *sequence, signer, ctx)?
                }
                None => self.orphan(OperationKind::Attest, signer, ctx),
            },
            BapOperation::Revoke { claim, sequence } => match identity {
                Some(identity) => self.apply_revoke(store, identity.id_key, claim, *sequence)?,
                None => match self.config.orphan_revoke {
                    OrphanPolicy::Skip => self.orphan(OperationKind::Revoke, signer, ctx),
                    OrphanPolicy::Fail => {
                        return Err(LedgerError::OrphanRevoke {
                            txid: ctx.txid,
                            claim: *claim,
                        })
                    }
                },
            },
            BapOperation::Alias { id_key, profile } => match identity {
                Some(identity) => self.apply_alias(store, identity, id_key, profile, ctx)?,
                None => self.orphan(OperationKind::Alias, signer, ctx),
            },
        };

        debug!(
            txid = %ctx.txid,
            height = ctx.height,
            kind = pair.operation.kind().as_str(),
            outcome = outcome.label(),
            "applied operation"
        );
        Ok(outcome)
    }

    fn apply_id<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        current: Option<Identity>,
        id_key: &IdKey,
        address: &BitcoinAddress,
        signer: &BitcoinAddress,
        ctx: &BlockContext,
    ) -> Result<ApplyOutcome, LedgerError> {
        if let Some(identity) = current {
            // The creating transaction resolves to its own identity on redelivery.
            if identity.addresses.iter().any(|entry| entry.txid == ctx.txid) {
                return Ok(ApplyOutcome::Replayed);
            }
            if let Some(holder) = store.find_by_current_address(address)? {
                if holder.id_key != identity.id_key {
                    debug!(
                        id_key = %identity.id_key,
                        held_by = %holder.id_key,
                        %address,
                        txid = %ctx.txid,
                        "ID rotates to another identity's current address"
                    );
                    return Ok(ApplyOutcome::StaleId);
                }
            }
            let update = IdentityUpdate::Rotate {
                id_key: identity.id_key.clone(),
                entry: AddressEntry::new(address.clone(), ctx),
            };
            return Ok(match store.update_identity(&update)? {
                IdentityWrite::Rotated { appended } => {
                    info!(
                        id_key = %identity.id_key,
                        from = %signer,
                        to = %address,
                        height = ctx.height,
                        "rotated identity address"
                    );
                    ApplyOutcome::AddressRotated { appended }
                }
                // Removed between lookup and update; nothing to rotate.
                _ => ApplyOutcome::StaleId,
            });
        }

        if store.find_identity(id_key)?.is_some() {
            debug!(%id_key, %signer, txid = %ctx.txid, "ID not signed by current address");
            return Ok(ApplyOutcome::StaleId);
        }

        let identity = Identity::create(id_key.clone(), signer.clone(), ctx);
        Ok(match store.update_identity(&IdentityUpdate::Create(identity))? {
            IdentityWrite::Created => {
                info!(%id_key, root = %signer, height = ctx.height, "created identity");
                ApplyOutcome::IdentityCreated
            }
            _ => ApplyOutcome::IdentityDuplicate,
        })
    }

    fn apply_attest<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        id_key: IdKey,
        claim: &ClaimHash,
        sequence: u64,
        signer: &BitcoinAddress,
        ctx: &BlockContext,
    ) -> Result<ApplyOutcome, LedgerError> {
        let update = AttestationUpdate::Sign {
            claim: *claim,
            signer: Signer::new(id_key.clone(), signer.clone(), sequence, ctx),
        };
        Ok(match store.update_attestation(&update)? {
            AttestationWrite::Created => ApplyOutcome::AttestationCreated,
            AttestationWrite::Signer(SignerChange::Added) => ApplyOutcome::SignerAdded,
            AttestationWrite::Signer(SignerChange::Replaced { previous }) => {
                ApplyOutcome::SignerReplaced { previous }
            }
            AttestationWrite::Signer(SignerChange::Rejected { stored }) => {
                debug!(%id_key, %claim, sequence, stored, "attestation sequence not greater than stored");
                ApplyOutcome::SignerRejected { stored }
            }
            other => {
                return Err(LedgerError::Storage(StoreError::Backend(format!(
                    "sign update reported {other:?}"
                ))))
            }
        })
    }

    fn apply_revoke<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        id_key: IdKey,
        claim: &ClaimHash,
        sequence: u64,
    ) -> Result<ApplyOutcome, LedgerError> {
        let update = AttestationUpdate::Revoke {
            claim: *claim,
            id_key: id_key.clone(),
            sequence,
        };
        let removed = match store.update_attestation(&update)? {
            AttestationWrite::Revoked(n) => n,
            _ => 0,
        };
        if removed > 0 {
            info!(%id_key, %claim, sequence, removed, "revoked attestation signers");
        }
        Ok(ApplyOutcome::Revoked { removed })
    }

    fn apply_alias<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        identity: Identity,
        id_key: &IdKey,
        payload: &str,
        ctx: &BlockContext,
    ) -> Result<ApplyOutcome, LedgerError> {
        if &identity.id_key != id_key {
            return Err(LedgerError::AliasKeyMismatch {
                txid: ctx.txid,
                signer_key: identity.id_key,
                op_key: id_key.clone(),
            });
        }

        let data = match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let reason = format!("profile is a JSON {}", json_type(&other));
                warn!(%id_key, txid = %ctx.txid, %reason, "skipping ALIAS");
                return Ok(ApplyOutcome::InvalidProfile { reason });
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%id_key, txid = %ctx.txid, %reason, "skipping ALIAS");
                return Ok(ApplyOutcome::InvalidProfile { reason });
            }
        };

        store.put_profile(&Profile::new(id_key.clone(), data, ctx))?;
        Ok(ApplyOutcome::ProfileUpdated)
    }

    fn orphan(&self, kind: OperationKind, signer: &BitcoinAddress, ctx: &BlockContext) -> ApplyOutcome {
        warn!(
            kind = kind.as_str(),
            %signer,
            txid = %ctx.txid,
            height = ctx.height,
            "no identity for signer, skipping"
        );
        ApplyOutcome::Orphaned { kind }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
