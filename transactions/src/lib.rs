//! Raw Bitcoin transaction decoding.
//!
//! A transaction is decoded into ordered inputs and outputs; each output
//! exposes the tapes of its data-carrier script. Only the fields needed to
//! index protocol data and compute the txid are kept.

pub mod error;
mod reader;
pub mod script;
pub mod tape;

pub use error::TxError;
pub use tape::{split_tapes, Tape};

use bap_types::TxHash;
use reader::Reader;

/// Minimum serialized sizes, used to bound declared counts.
const MIN_INPUT_LEN: usize = 32 + 4 + 1 + 4;
const MIN_OUTPUT_LEN: usize = 8 + 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prev_txid: TxHash,
    pub prev_index: u32,
    pub script: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script: Vec<u8>,
}

impl TxOutput {
    /// Tapes of this output; empty unless it is a data carrier.
    pub fn tapes(&self) -> Result<Vec<Tape>, TxError> {
        split_tapes(&self.script)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Decode a serialized transaction. The whole buffer must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let mut r = Reader::new(bytes);
        let version = r.u32_le()?;

        let input_count = r.count(MIN_INPUT_LEN)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let mut prev = r.array::<32>()?;
            prev.reverse();
            inputs.push(TxInput {
                prev_txid: TxHash::new(prev),
                prev_index: r.u32_le()?,
                script: r.var_bytes()?.to_vec(),
                sequence: r.u32_le()?,
            });
        }

        let output_count = r.count(MIN_OUTPUT_LEN)?;
        if output_count == 0 {
            return Err(TxError::NoOutputs);
        }
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TxOutput {
                value: r.u64_le()?,
                script: r.var_bytes()?.to_vec(),
            });
        }

        let lock_time = r.u32_le()?;
        if r.remaining() > 0 {
            return Err(TxError::TrailingBytes(r.remaining()));
        }
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Serialize back to wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            let mut prev = *input.prev_txid.as_bytes();
            prev.reverse();
            out.extend_from_slice(&prev);
            out.extend_from_slice(&input.prev_index.to_le_bytes());
            write_varint(&mut out, input.script.len() as u64);
            out.extend_from_slice(&input.script);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_varint(&mut out, output.script.len() as u64);
            out.extend_from_slice(&output.script);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    pub fn txid(&self) -> TxHash {
        bap_crypto::hash_transaction(&self.encode())
    }

    /// A single-input transaction carrying one data output per entry of
    /// `outputs`. Used to build fixtures.
    pub fn with_data_outputs(outputs: &[Vec<Tape>]) -> Self {
        Self {
            version: 1,
            inputs: vec![TxInput {
                prev_txid: TxHash::ZERO,
                prev_index: 0,
                script: Vec::new(),
                sequence: u32::MAX,
            }],
            outputs: outputs
                .iter()
                .map(|tapes| TxOutput {
                    value: 0,
                    script: tape::carrier_script(tapes),
                })
                .collect(),
            lock_time: 0,
        }
    }
}

fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}
