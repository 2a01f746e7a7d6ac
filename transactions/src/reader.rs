//! Cursor over serialized transaction bytes.

use crate::TxError;

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TxError> {
        if self.remaining() < n {
            return Err(TxError::UnexpectedEof {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, TxError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32_le(&mut self) -> Result<u32, TxError> {
        self.array::<4>().map(u32::from_le_bytes)
    }

    pub fn u64_le(&mut self) -> Result<u64, TxError> {
        self.array::<8>().map(u64::from_le_bytes)
    }

    /// Bitcoin CompactSize integer.
    pub fn varint(&mut self) -> Result<u64, TxError> {
        Ok(match self.u8()? {
            0xfd => u64::from(self.array::<2>().map(u16::from_le_bytes)?),
            0xfe => u64::from(self.u32_le()?),
            0xff => self.u64_le()?,
            n => u64::from(n),
        })
    }

    /// A count of items, each at least `min_item_len` bytes long.
    pub fn count(&mut self, min_item_len: usize) -> Result<usize, TxError> {
        let count = self.varint()?;
        let fits = usize::try_from(count)
            .ok()
            .filter(|&c| c.saturating_mul(min_item_len) <= self.remaining());
        fits.ok_or(TxError::CountTooLarge { count })
    }

    /// Length-prefixed byte string. A length past the end is a truncation.
    pub fn var_bytes(&mut self) -> Result<&'a [u8], TxError> {
        let len = usize::try_from(self.varint()?).unwrap_or(usize::MAX);
        self.take(len)
    }
}
