//! A small big-endian cursor over a borrowed byte slice.
//!
//! The container, clip and image decoders all work off byte ranges sliced
//! out of a single in-memory buffer (see `DESIGN.md` on memory ownership),
//! so unlike a `Read`-based reader this never copies or blocks.

use crate::error::FormatError;

macro_rules! read_int {
    ($fn:ident, $Ty:ty) => {
        #[inline]
        pub(crate) fn $fn(&mut self) -> Result<$Ty, FormatError> {
            self.read_array().map(<$Ty>::from_be_bytes)
        }
    };
}

pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[inline]
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[inline]
    pub(crate) fn skip(&mut self, amount: usize) -> Result<(), FormatError> {
        self.read_bytes(amount).map(|_| ())
    }

    pub(crate) fn read_bytes(&mut self, amount: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < amount {
            return Err(FormatError::TruncatedChunk {
                needed: amount,
                available: self.remaining(),
            });
        }

        let slice = &self.bytes[self.pos..self.pos + amount];
        self.pos += amount;
        Ok(slice)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        self.read_bytes(N).map(|slice| {
            let mut buf = [0; N];
            buf.copy_from_slice(slice);
            buf
        })
    }

    read_int! { read_u16, u16 }
    read_int! { read_u32, u32 }
    read_int! { read_u64, u64 }

    #[inline]
    pub(crate) fn read_u8(&mut self) -> Result<u8, FormatError> {
        self.read_array::<1>().map(|b| b[0])
    }
}
