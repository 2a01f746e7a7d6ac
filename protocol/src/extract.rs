//! Protocol extraction: pairing BAP operations with the AIP envelope that
//! follows them in the same output.

use bap_transactions::{Transaction, TxError};
use bap_types::{BapOperation, OperationPair};

use crate::aip::{decode_aip, is_aip};
use crate::bap::{decode_bap, is_bap};
use crate::ProtocolError;

/// Why part of a transaction yielded nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    Script { output: usize, error: TxError },
    Tape { output: usize, tape: usize, error: ProtocolError },
}

/// Pairs found in a transaction, plus whatever failed to decode on the way.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub pairs: Vec<OperationPair>,
    pub skipped: Vec<Skipped>,
}

/// Scan every output for `[BAP][AIP]` adjacencies.
///
/// Each output is scanned with a single pending slot: a decoded BAP tape
/// fills it, an AIP tape empties it into a pair, and anything else (another
/// protocol, a decode failure, an AIP that fails to decode) clears it.
pub fn scan(tx: &Transaction) -> Extraction {
    let mut out = Extraction::default();
    for (index, output) in tx.outputs.iter().enumerate() {
        let tapes = match output.tapes() {
            Ok(tapes) => tapes,
            Err(error) => {
                out.skipped.push(Skipped::Script {
                    output: index,
                    error,
                });
                continue;
            }
        };

        let mut pending: Option<BapOperation> = None;
        for (t, tape) in tapes.iter().enumerate() {
            if is_bap(tape) {
                pending = match decode_bap(tape) {
                    Ok(op) => Some(op),
                    Err(error) => {
                        out.skipped.push(Skipped::Tape {
                            output: index,
                            tape: t,
                            error,
                        });
                        None
                    }
                };
            } else if is_aip(tape) {
                let Some(operation) = pending.take() else {
                    continue;
                };
                match decode_aip(tape, &tapes[..t]) {
                    Ok(envelope) => out.pairs.push(OperationPair {
                        operation,
                        envelope,
                        output: index,
                    }),
                    Err(error) => out.skipped.push(Skipped::Tape {
                        output: index,
                        tape: t,
                        error,
                    }),
                }
            } else {
                pending = None;
            }
        }
    }
    out
}

/// The operation pairs of `tx`, in output order.
pub fn extract(tx: &Transaction) -> Vec<OperationPair> {
    scan(tx).pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::{AIP_PREFIX, BAP_PREFIX};
    use bap_transactions::Tape;
    use bap_types::OperationKind;

    const ADDR: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
    const CLAIM: &str = "b17c8e606afcf0d8dca65bdf8f33d275239438116557980203c82b0fae259838";

    fn tape(cells: &[&str]) -> Tape {
        Tape::new(cells.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    fn bap_id() -> Tape {
        tape(&[BAP_PREFIX, "ID", "key", ADDR])
    }

    fn bap_attest() -> Tape {
        tape(&[BAP_PREFIX, "ATTEST", CLAIM, "0"])
    }

    fn aip() -> Tape {
        tape(&[AIP_PREFIX, "BITCOIN_ECDSA", ADDR, "c2ln"])
    }

    fn other() -> Tape {
        tape(&["19HxigV4QyBv3tHpQVcUEQyq1pzZVdoAut", "text/plain", "hi"])
    }

    fn tx(outputs: Vec<Vec<Tape>>) -> Transaction {
        Transaction::with_data_outputs(&outputs)
    }

    #[test]
    fn bap_then_aip_pairs() {
        let pairs = extract(&tx(vec![vec![bap_id(), aip()]]));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].operation.kind(), OperationKind::Id);
        assert_eq!(pairs[0].signer().as_str(), ADDR);
    }

    #[test]
    fn interposed_tape_breaks_pairing() {
        assert!(extract(&tx(vec![vec![bap_id(), other(), aip()]])).is_empty());
    }

    #[test]
    fn lone_aip_yields_nothing() {
        assert!(extract(&tx(vec![vec![aip()]])).is_empty());
    }

    #[test]
    fn later_bap_overwrites_pending() {
        let pairs = extract(&tx(vec![vec![bap_id(), bap_attest(), aip()]]));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].operation.kind(), OperationKind::Attest);
        assert_eq!(pairs[0].envelope.message.len(), {
            let t = [bap_id(), bap_attest()];
            crate::aip::signed_message(&t, &[]).unwrap().len()
        });
    }

    #[test]
    fn failed_bap_clears_pending() {
        let broken = tape(&[BAP_PREFIX, "ATTEST", "nothex", "0"]);
        let ex = scan(&tx(vec![vec![bap_id(), broken, aip()]]));
        assert!(ex.pairs.is_empty());
        assert_eq!(ex.skipped.len(), 1);
    }

    #[test]
    fn pairing_does_not_cross_outputs() {
        let pairs = extract(&tx(vec![vec![bap_id()], vec![aip()]]));
        assert!(pairs.is_empty());
    }

    #[test]
    fn pairs_follow_output_order() {
        let pairs = extract(&tx(vec![
            vec![bap_attest(), aip()],
            vec![other()],
            vec![bap_id(), aip()],
        ]));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].output, 0);
        assert_eq!(pairs[0].operation.kind(), OperationKind::Attest);
        assert_eq!(pairs[1].output, 2);
        assert_eq!(pairs[1].operation.kind(), OperationKind::Id);
    }

    #[test]
    fn two_pairs_in_one_output() {
        let pairs = extract(&tx(vec![vec![bap_id(), aip(), bap_attest(), aip()]]));
        assert_eq!(pairs.len(), 2);
    }
}
