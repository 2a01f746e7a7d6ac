//! Identity document and its address history.

use serde::{Deserialize, Serialize};

use crate::{BitcoinAddress, BlockContext, BlockHeight, IdKey, Timestamp, TxHash};

/// One entry in an identity's address history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: BitcoinAddress,
    #[serde(rename = "txId")]
    pub txid: TxHash,
    pub block: BlockHeight,
    pub timestamp: Timestamp,
}

impl AddressEntry {
    pub fn new(address: BitcoinAddress, ctx: &BlockContext) -> Self {
        Self {
            address,
            txid: ctx.txid,
            block: ctx.height,
            timestamp: ctx.time,
        }
    }
}

/// A BAP identity, keyed by `id_key`.
///
/// `addresses` is append-only and never empty once created; its last entry
/// always carries `current_address`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id_key: IdKey,
    pub first_seen: BlockHeight,
    pub root_address: BitcoinAddress,
    pub current_address: BitcoinAddress,
    pub addresses: Vec<AddressEntry>,
}

impl Identity {
    /// A new identity whose root and current address are the signer.
    pub fn create(id_key: IdKey, signer: BitcoinAddress, ctx: &BlockContext) -> Self {
        Self {
            id_key,
            first_seen: ctx.height,
            root_address: signer.clone(),
            current_address: signer.clone(),
            addresses: vec![AddressEntry::new(signer, ctx)],
        }
    }

    /// Append `entry` unless an identical entry is already present, then
    /// make its address current. Returns whether the history grew.
    pub fn rotate(&mut self, entry: AddressEntry) -> bool {
        self.current_address = entry.address.clone();
        if self.addresses.contains(&entry) {
            return false;
        }
        self.addresses.push(entry);
        true
    }

    pub fn has_used(&self, address: &BitcoinAddress) -> bool {
        self.addresses.iter().any(|e| &e.address == address)
    }

    /// Check the history invariant: non-empty and ending at the current address.
    pub fn is_consistent(&self) -> bool {
        self.addresses
            .last()
            .is_some_and(|last| last.address == self.current_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(height: BlockHeight, tx: u8) -> BlockContext {
        BlockContext::new(height, Timestamp::new(1_600_000_000), TxHash::new([tx; 32]))
    }

    #[test]
    fn create_sets_root_and_current_to_signer() {
        let a1 = BitcoinAddress::new("1A1111111111111111111111111");
        let id = Identity::create(IdKey::new("X"), a1.clone(), &ctx(100, 1));
        assert_eq!(id.root_address, a1);
        assert_eq!(id.current_address, a1);
        assert_eq!(id.first_seen, 100);
        assert_eq!(id.addresses.len(), 1);
        assert!(id.is_consistent());
    }

    #[test]
    fn rotate_is_add_to_set() {
        let a1 = BitcoinAddress::new("1A1111111111111111111111111");
        let a2 = BitcoinAddress::new("1A2222222222222222222222222");
        let mut id = Identity::create(IdKey::new("X"), a1, &ctx(100, 1));
        let entry = AddressEntry::new(a2.clone(), &ctx(150, 2));

        assert!(id.rotate(entry.clone()));
        assert!(!id.rotate(entry));
        assert_eq!(id.addresses.len(), 2);
        assert_eq!(id.current_address, a2);
        assert!(id.is_consistent());
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let a1 = BitcoinAddress::new("1A1111111111111111111111111");
        let id = Identity::create(IdKey::new("X"), a1, &ctx(100, 1));
        let v = serde_json::to_value(&id).unwrap();
        assert!(v.get("idKey").is_some());
        assert!(v.get("firstSeen").is_some());
        assert!(v.get("currentAddress").is_some());
        assert!(v["addresses"][0].get("txId").is_some());
    }
}
