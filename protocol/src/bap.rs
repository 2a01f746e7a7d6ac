//! BAP tape decoding.
//!
//! Layouts, after the prefix cell:
//! `ID <idKey> <address>`, `ATTEST <claimHash> <sequence>`,
//! `REVOKE <claimHash> <sequence>`, `ALIAS <idKey> <profile JSON>`.

use bap_transactions::Tape;
use bap_types::{BapOperation, BitcoinAddress, ClaimHash, IdKey, OperationKind};

use crate::prefix::BAP_PREFIX;
use crate::ProtocolError;

fn field<'a>(
    tape: &'a Tape,
    i: usize,
    kind: &'static str,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    let cell = tape
        .cell(i)
        .filter(|c| !c.is_empty())
        .ok_or(ProtocolError::MissingField { kind, field: name })?;
    std::str::from_utf8(cell).map_err(|_| ProtocolError::NotText(name))
}

fn sequence(text: &str) -> Result<u64, ProtocolError> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidSequence(text.to_string()));
    }
    text.parse()
        .map_err(|_| ProtocolError::InvalidSequence(text.to_string()))
}

fn address(text: &str) -> Result<BitcoinAddress, ProtocolError> {
    let addr = BitcoinAddress::new(text);
    if bap_crypto::validate_address(&addr) {
        Ok(addr)
    } else {
        Err(ProtocolError::InvalidAddress(text.to_string()))
    }
}

pub fn is_bap(tape: &Tape) -> bool {
    tape.prefix() == Some(BAP_PREFIX.as_bytes())
}

/// Decode a BAP tape into an operation.
pub fn decode_bap(tape: &Tape) -> Result<BapOperation, ProtocolError> {
    if !is_bap(tape) {
        return Err(ProtocolError::WrongPrefix("BAP"));
    }
    let keyword = field(tape, 1, "BAP", "type")?;
    let kind: OperationKind = keyword
        .parse()
        .map_err(|_| ProtocolError::UnknownKind(keyword.to_string()))?;
    let name = kind.as_str();

    Ok(match kind {
        OperationKind::Id => {
            let key = field(tape, 2, name, "idKey")?;
            BapOperation::Id {
                id_key: IdKey::parse(key).map_err(|_| ProtocolError::InvalidIdKey(key.into()))?,
                address: address(field(tape, 3, name, "address")?)?,
            }
        }
        OperationKind::Attest | OperationKind::Revoke => {
            let hash = field(tape, 2, name, "claimHash")?;
            let claim = ClaimHash::from_hex(hash)
                .map_err(|_| ProtocolError::InvalidClaimHash(hash.to_string()))?;
            let sequence = sequence(field(tape, 3, name, "sequence")?)?;
            if kind == OperationKind::Attest {
                BapOperation::Attest { claim, sequence }
            } else {
                BapOperation::Revoke { claim, sequence }
            }
        }
        OperationKind::Alias => {
            let key = field(tape, 2, name, "idKey")?;
            let id_key = IdKey::parse(key).map_err(|_| ProtocolError::InvalidIdKey(key.into()))?;
            let profile = field(tape, 3, name, "profile")
                .map_err(|e| match e {
                    ProtocolError::MissingField { .. } => ProtocolError::EmptyProfile,
                    other => other,
                })?
                .to_string();
            BapOperation::Alias { id_key, profile }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLAIM: &str = "b17c8e606afcf0d8dca65bdf8f33d275239438116557980203c82b0fae259838";
    const ADDR: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

    fn bap(cells: &[&str]) -> Tape {
        let mut all = vec![BAP_PREFIX.as_bytes().to_vec()];
        all.extend(cells.iter().map(|c| c.as_bytes().to_vec()));
        Tape::new(all)
    }

    #[test]
    fn decodes_id() {
        let op = decode_bap(&bap(&["ID", "idkey1", ADDR])).unwrap();
        assert_eq!(
            op,
            BapOperation::Id {
                id_key: IdKey::new("idkey1"),
                address: BitcoinAddress::new(ADDR),
            }
        );
    }

    #[test]
    fn decodes_attest_and_revoke() {
        let op = decode_bap(&bap(&["ATTEST", CLAIM, "3"])).unwrap();
        assert_eq!(
            op,
            BapOperation::Attest {
                claim: ClaimHash::from_hex(CLAIM).unwrap(),
                sequence: 3
            }
        );
        let op = decode_bap(&bap(&["REVOKE", CLAIM, "0"])).unwrap();
        assert!(matches!(op, BapOperation::Revoke { sequence: 0, .. }));
    }

    #[test]
    fn decodes_alias() {
        let op = decode_bap(&bap(&["ALIAS", "idkey1", r#"{"name":"x"}"#])).unwrap();
        assert_eq!(op.kind(), OperationKind::Alias);
    }

    #[test]
    fn rejects_malformed_fields() {
        assert_eq!(
            decode_bap(&bap(&["ID", "idkey1"])),
            Err(ProtocolError::MissingField {
                kind: "ID",
                field: "address"
            })
        );
        assert!(matches!(
            decode_bap(&bap(&["ID", "idkey1", "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ"])),
            Err(ProtocolError::InvalidAddress(_))
        ));
        assert!(matches!(
            decode_bap(&bap(&["ATTEST", "zz", "1"])),
            Err(ProtocolError::InvalidClaimHash(_))
        ));
        assert!(matches!(
            decode_bap(&bap(&["ATTEST", CLAIM, "+1"])),
            Err(ProtocolError::InvalidSequence(_))
        ));
        assert!(matches!(
            decode_bap(&bap(&["ATTEST", CLAIM, "-1"])),
            Err(ProtocolError::InvalidSequence(_))
        ));
        assert_eq!(
            decode_bap(&bap(&["ALIAS", "idkey1", ""])),
            Err(ProtocolError::EmptyProfile)
        );
        assert!(matches!(
            decode_bap(&bap(&["SELL", "x", "y"])),
            Err(ProtocolError::UnknownKind(_))
        ));
    }

    #[test]
    fn rejects_other_prefix() {
        let tape = Tape::new(vec![b"19HxigV4QyBv3tHpQVcUEQyq1pzZVdoAut".to_vec()]);
        assert_eq!(decode_bap(&tape), Err(ProtocolError::WrongPrefix("BAP")));
    }
}
