//! Script pushdata parsing and encoding.
//!
//! Only the subset needed for data-carrier outputs is interpreted: push
//! opcodes yield their payload, every other byte is an opaque opcode.

use crate::TxError;

pub const OP_FALSE: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_RETURN: u8 = 0x6a;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op<'a> {
    Push(&'a [u8]),
    Code(u8),
}

/// Split a script into pushes and opcodes.
pub fn parse(script: &[u8]) -> Result<Vec<Op<'_>>, TxError> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while pos < script.len() {
        let start = pos;
        let opcode = script[pos];
        pos += 1;
        let (len, header) = match opcode {
            OP_FALSE => (0, 0),
            0x01..=0x4b => (opcode as usize, 0),
            OP_PUSHDATA1 => (read_len(script, pos, 1, start)?, 1),
            OP_PUSHDATA2 => (read_len(script, pos, 2, start)?, 2),
            OP_PUSHDATA4 => (read_len(script, pos, 4, start)?, 4),
            code => {
                ops.push(Op::Code(code));
                continue;
            }
        };
        pos += header;
        let end = pos
            .checked_add(len)
            .filter(|&end| end <= script.len())
            .ok_or(TxError::TruncatedPush { offset: start })?;
        ops.push(Op::Push(&script[pos..end]));
        pos = end;
    }
    Ok(ops)
}

fn read_len(script: &[u8], pos: usize, width: usize, start: usize) -> Result<usize, TxError> {
    let bytes = script
        .get(pos..pos + width)
        .ok_or(TxError::TruncatedPush { offset: start })?;
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Whether the script is an `OP_RETURN` or `OP_FALSE OP_RETURN` data carrier.
/// Returns the offset just past `OP_RETURN`.
pub fn data_carrier_offset(script: &[u8]) -> Option<usize> {
    match script {
        [OP_RETURN, ..] => Some(1),
        [OP_FALSE, OP_RETURN, ..] => Some(2),
        _ => None,
    }
}

/// Append the minimal push encoding of `data`.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => buf.push(OP_FALSE),
        n @ 1..=0x4b => buf.push(n as u8),
        n @ 0x4c..=0xff => {
            buf.push(OP_PUSHDATA1);
            buf.push(n as u8);
        }
        n @ 0x100..=0xffff => {
            buf.push(OP_PUSHDATA2);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        n => {
            buf.push(OP_PUSHDATA4);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
    }
    buf.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_push_form() {
        let mut script = vec![OP_RETURN];
        push_data(&mut script, b"abc");
        push_data(&mut script, &[7u8; 80]);
        push_data(&mut script, &[8u8; 300]);
        push_data(&mut script, b"");
        let ops = parse(&script).unwrap();
        assert_eq!(ops[0], Op::Code(OP_RETURN));
        assert_eq!(ops[1], Op::Push(b"abc"));
        assert_eq!(ops[2], Op::Push(&[7u8; 80]));
        assert_eq!(ops[3], Op::Push(&[8u8; 300]));
        assert_eq!(ops[4], Op::Push(b""));
    }

    #[test]
    fn truncated_push_is_an_error() {
        assert_eq!(parse(&[0x05, 1, 2]), Err(TxError::TruncatedPush { offset: 0 }));
        assert_eq!(
            parse(&[OP_RETURN, OP_PUSHDATA2, 0x01]),
            Err(TxError::TruncatedPush { offset: 1 })
        );
    }

    #[test]
    fn recognises_both_carrier_forms() {
        assert_eq!(data_carrier_offset(&[OP_RETURN, 1, 0]), Some(1));
        assert_eq!(data_carrier_offset(&[OP_FALSE, OP_RETURN]), Some(2));
        assert_eq!(data_carrier_offset(&[0x76, 0xa9]), None);
        assert_eq!(data_carrier_offset(&[]), None);
    }
}
