use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("declared count {count} exceeds remaining data")]
    CountTooLarge { count: u64 },

    #[error("pushdata at script offset {offset} runs past the end of the script")]
    TruncatedPush { offset: usize },

    #[error("transaction has no outputs")]
    NoOutputs,
}
