//! Offset-tracked reads over an immutable byte buffer.

use nom::{
    combinator::map,
    number::complete::{le_f32, le_i32, le_u32, le_u8},
    sequence::tuple,
    IResult,
};

use crate::{syntax::ChunkId, Result, VoxError};

/// Reads fixed-layout fields front to back out of a borrowed buffer.
///
/// Every read names its width up front, so a short buffer is reported as
/// [`VoxError::TruncatedInput`] before any parser runs and the offset only
/// moves on success.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor::with_base(bytes, 0)
    }

    /// A cursor over a slice that starts `base` bytes into some larger buffer.
    /// Only affects the offsets reported in errors.
    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Cursor { bytes, offset: 0, base }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset including the base, as reported in errors.
    pub fn position(&self) -> usize {
        self.base + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails unless at least `width` more bytes are available.
    pub fn ensure(&self, width: usize) -> Result<()> {
        if width > self.remaining() {
            Err(VoxError::TruncatedInput {
                offset: self.position(),
                needed: width,
                remaining: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Runs `parser` over exactly the next `width` bytes and moves past them.
    pub fn read<O, P>(&mut self, width: usize, mut parser: P) -> Result<O>
    where
        P: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
    {
        self.ensure(width)?;
        let field = &self.bytes[self.offset..self.offset + width];
        // fixed-layout parsers can only fail on a field shorter than they expect
        let (_, value) = parser(field).map_err(|_| VoxError::TruncatedInput {
            offset: self.position(),
            needed: width,
            remaining: self.remaining(),
        })?;
        self.offset += width;
        Ok(value)
    }

    pub fn read_bytes(&mut self, width: usize) -> Result<&'a [u8]> {
        self.ensure(width)?;
        let field = &self.bytes[self.offset..self.offset + width];
        self.offset += width;
        Ok(field)
    }

    pub fn skip(&mut self, width: usize) -> Result<()> {
        self.read_bytes(width).map(|_| ())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read(4, le_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read(4, le_i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read(4, le_f32)
    }

    pub fn read_id(&mut self) -> Result<ChunkId> {
        self.read(4, ChunkId::parse)
    }
}

pub(crate) fn four_bytes(i: &[u8]) -> IResult<&[u8], [u8; 4]> {
    map(tuple((le_u8, le_u8, le_u8, le_u8)), |(a, b, c, d)| [a, b, c, d])(i)
}
