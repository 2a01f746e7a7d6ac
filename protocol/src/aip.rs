//! AIP envelope decoding and signed-message assembly.
//!
//! Layout after the prefix cell: `<algorithm> <address> <signature> [<index>...]`.
//! The signature covers `j`, then every cell of the tapes that precede the
//! envelope in the same output, with `|` closing each tape. When indices are
//! given, only those positions of that sequence are signed.

use bap_transactions::tape::PIPE;
use bap_transactions::Tape;
use bap_types::{AipEnvelope, BitcoinAddress};

use crate::prefix::{AIP_PREFIX, OP_RETURN_MARKER};
use crate::ProtocolError;

pub fn is_aip(tape: &Tape) -> bool {
    tape.prefix() == Some(AIP_PREFIX.as_bytes())
}

fn text<'a>(tape: &'a Tape, i: usize, name: &'static str) -> Result<&'a str, ProtocolError> {
    let cell = tape
        .cell(i)
        .filter(|c| !c.is_empty())
        .ok_or(ProtocolError::MissingField {
            kind: "AIP",
            field: name,
        })?;
    std::str::from_utf8(cell).map_err(|_| ProtocolError::NotText(name))
}

/// The byte string an envelope following `preceding` signs.
pub fn signed_message(preceding: &[Tape], indices: &[usize]) -> Result<Vec<u8>, ProtocolError> {
    let mut parts: Vec<&[u8]> = vec![OP_RETURN_MARKER];
    for tape in preceding {
        parts.extend(tape.cells.iter().map(Vec::as_slice));
        parts.push(PIPE);
    }
    if indices.is_empty() {
        return Ok(parts.concat());
    }
    let mut message = Vec::new();
    for &i in indices {
        let part = parts
            .get(i)
            .ok_or_else(|| ProtocolError::InvalidIndex(i.to_string()))?;
        message.extend_from_slice(part);
    }
    Ok(message)
}

/// Decode an AIP tape, assembling its signed message from `preceding`.
pub fn decode_aip(tape: &Tape, preceding: &[Tape]) -> Result<AipEnvelope, ProtocolError> {
    if !is_aip(tape) {
        return Err(ProtocolError::WrongPrefix("AIP"));
    }
    let algorithm = text(tape, 1, "algorithm")?.to_string();
    let address = BitcoinAddress::parse(text(tape, 2, "address")?)
        .map_err(|e| ProtocolError::InvalidAddress(e.to_string()))?;
    let signature = text(tape, 3, "signature")?.to_string();

    let mut indices = Vec::new();
    for i in 4..tape.len() {
        let raw = text(tape, i, "index")?;
        let index = raw
            .parse::<usize>()
            .map_err(|_| ProtocolError::InvalidIndex(raw.to_string()))?;
        indices.push(index);
    }
    let message = signed_message(preceding, &indices)?;

    Ok(AipEnvelope {
        algorithm,
        address,
        signature,
        indices,
        message,
    })
}
