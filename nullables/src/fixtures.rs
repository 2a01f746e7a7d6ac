//! Correctly signed BAP transactions for tests.

use bap_crypto::{address_from_secret, sign_message};
use bap_network::FeedTransaction;
use bap_protocol::{signed_message, AIP_PREFIX, BAP_PREFIX, BITCOIN_ECDSA};
use bap_transactions::{Tape, Transaction};
use bap_types::{BitcoinAddress, BlockHeight, ClaimHash, Timestamp};

/// A deterministic secp256k1 key and its compressed P2PKH address.
#[derive(Clone, Debug)]
pub struct TestKey {
    secret: [u8; 32],
    address: BitcoinAddress,
}

impl TestKey {
    pub fn new(seed: u8) -> Self {
        let mut secret = [0u8; 32];
        secret[30] = 0xb0;
        secret[31] = seed;
        let address = address_from_secret(&secret, true).expect("fixture secret is a valid scalar");
        Self { secret, address }
    }

    pub fn address(&self) -> &BitcoinAddress {
        &self.address
    }

    /// `op` followed by an AIP tape signing it.
    pub fn sign(&self, op: Tape) -> Vec<Tape> {
        let message = signed_message(std::slice::from_ref(&op), &[]).expect("no indices");
        let signature = sign_message(&message, &self.secret, true).expect("valid key");
        let aip = text_tape(&[AIP_PREFIX, BITCOIN_ECDSA, self.address.as_str(), &signature]);
        vec![op, aip]
    }
}

pub fn text_tape(cells: &[&str]) -> Tape {
    Tape::new(cells.iter().map(|c| c.as_bytes().to_vec()).collect())
}

pub fn id_tape(id_key: &str, address: &BitcoinAddress) -> Tape {
    text_tape(&[BAP_PREFIX, "ID", id_key, address.as_str()])
}

pub fn attest_tape(claim: &ClaimHash, sequence: u64) -> Tape {
    text_tape(&[BAP_PREFIX, "ATTEST", &claim.to_string(), &sequence.to_string()])
}

pub fn revoke_tape(claim: &ClaimHash, sequence: u64) -> Tape {
    text_tape(&[BAP_PREFIX, "REVOKE", &claim.to_string(), &sequence.to_string()])
}

pub fn alias_tape(id_key: &str, profile: &str) -> Tape {
    text_tape(&[BAP_PREFIX, "ALIAS", id_key, profile])
}

/// A transaction with one data-carrier output per entry of `outputs`.
/// `nonce` keeps otherwise identical transactions apart.
pub fn transaction(outputs: Vec<Vec<Tape>>, nonce: u32) -> Transaction {
    let mut tx = Transaction::with_data_outputs(&outputs);
    tx.lock_time = nonce;
    tx
}

/// The feed delivery of `tx` mined at `height`.
pub fn mined(tx: &Transaction, height: BlockHeight) -> FeedTransaction {
    FeedTransaction {
        id: tx.txid(),
        height,
        time: Timestamp::new(1_550_000_000 + u64::from(height)),
        raw: tx.encode(),
    }
}

/// The feed delivery of `tx` while unconfirmed.
pub fn unconfirmed(tx: &Transaction) -> FeedTransaction {
    FeedTransaction {
        id: tx.txid(),
        height: 0,
        time: Timestamp::EPOCH,
        raw: tx.encode(),
    }
}
