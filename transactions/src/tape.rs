//! Tapes: the `|`-separated segments of a data-carrier output.

use crate::script::{self, data_carrier_offset, Op};
use crate::TxError;

/// The single-byte push that separates protocols within one output.
pub const PIPE: &[u8] = b"|";

/// One protocol segment: the push cells between two `|` separators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tape {
    pub cells: Vec<Vec<u8>>,
}

impl Tape {
    pub fn new(cells: Vec<Vec<u8>>) -> Self {
        Self { cells }
    }

    /// The protocol prefix cell.
    pub fn prefix(&self) -> Option<&[u8]> {
        self.cell(0)
    }

    pub fn cell(&self, i: usize) -> Option<&[u8]> {
        self.cells.get(i).map(Vec::as_slice)
    }

    /// A cell as UTF-8 text, or `None` when absent or not text.
    pub fn text(&self, i: usize) -> Option<&str> {
        self.cell(i).and_then(|c| std::str::from_utf8(c).ok())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Split a data-carrier script into tapes. Other scripts have none.
///
/// Opcodes after `OP_RETURN` are not cells. Empty segments (`||` or a
/// trailing `|`) produce no tape.
pub fn split_tapes(script: &[u8]) -> Result<Vec<Tape>, TxError> {
    let Some(offset) = data_carrier_offset(script) else {
        return Ok(Vec::new());
    };
    let mut tapes = Vec::new();
    let mut current = Tape::default();
    for op in script::parse(&script[offset..])? {
        match op {
            Op::Push(PIPE) => {
                if !current.is_empty() {
                    tapes.push(std::mem::take(&mut current));
                }
            }
            Op::Push(data) => current.cells.push(data.to_vec()),
            Op::Code(_) => {}
        }
    }
    if !current.is_empty() {
        tapes.push(current);
    }
    Ok(tapes)
}

/// Build an `OP_FALSE OP_RETURN` script carrying `tapes`.
pub fn carrier_script(tapes: &[Tape]) -> Vec<u8> {
    let mut out = vec![script::OP_FALSE, script::OP_RETURN];
    for (i, tape) in tapes.iter().enumerate() {
        if i > 0 {
            script::push_data(&mut out, PIPE);
        }
        for cell in &tape.cells {
            script::push_data(&mut out, cell);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape(cells: &[&str]) -> Tape {
        Tape::new(cells.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    #[test]
    fn splits_on_pipe() {
        let tapes = vec![tape(&["A", "x", "y"]), tape(&["B", "z"])];
        let script = carrier_script(&tapes);
        assert_eq!(split_tapes(&script).unwrap(), tapes);
    }

    #[test]
    fn pipe_inside_a_cell_does_not_split() {
        let tapes = vec![tape(&["A", "a|b"])];
        let script = carrier_script(&tapes);
        assert_eq!(split_tapes(&script).unwrap(), tapes);
    }

    #[test]
    fn non_carrier_has_no_tapes() {
        let p2pkh = [0x76, 0xa9, 0x14];
        assert!(split_tapes(&p2pkh).unwrap().is_empty());
    }

    #[test]
    fn empty_segments_are_dropped() {
        let mut script = vec![script::OP_RETURN];
        script::push_data(&mut script, b"|");
        script::push_data(&mut script, b"A");
        script::push_data(&mut script, b"|");
        script::push_data(&mut script, b"|");
        let tapes = split_tapes(&script).unwrap();
        assert_eq!(tapes, vec![tape(&["A"])]);
    }

    #[test]
    fn text_rejects_invalid_utf8() {
        let t = Tape::new(vec![vec![0xff, 0xfe]]);
        assert_eq!(t.text(0), None);
        assert_eq!(t.cell(0), Some(&[0xff, 0xfe][..]));
    }
}
