//! Bounds-checked big-endian reader over a borrowed byte range.
//!
//! Every read validates the remaining length first and reports a
//! [`DecodeError`] instead of slicing past the end, so callers can walk
//! attacker-controlled nested records without panicking.

use bytes::Buf;
use thiserror::Error;

use super::boxes::FourCc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated record at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid declared size {size} at offset {offset}")]
    InvalidSize { offset: usize, size: u64 },

    #[error("no '{0}' record found")]
    Missing(FourCc),

    #[error("expected '{expected}' record, found '{found}'")]
    UnexpectedType { expected: FourCc, found: FourCc },

    #[error("bad signature")]
    BadSignature,
}

#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes, without advancing
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        let v = self.rest().get_u8();
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        let v = self.rest().get_u16();
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        let v = self.rest().get_u32();
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.ensure(8)?;
        let v = self.rest().get_u64();
        self.pos += 8;
        Ok(v)
    }

    pub fn read_fourcc(&mut self) -> Result<FourCc, DecodeError> {
        let bytes = self.take(4)?.rest();
        Ok(FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Splits off the next `n` bytes as their own cursor and advances past them.
    pub fn take(&mut self, n: usize) -> Result<ByteCursor<'a>, DecodeError> {
        self.ensure(n)?;
        let sub = ByteCursor::new(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_fields_in_order() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u8().unwrap(), 0x01);
        assert_eq!(c.read_u16().unwrap(), 0x0203);
        assert_eq!(c.read_u32().unwrap(), 0x04050607);
        assert!(c.is_empty());
    }

    #[test]
    fn short_read_reports_offset_and_does_not_advance() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut c = ByteCursor::new(&data);
        c.skip(1).unwrap();
        let err = c.read_u32().unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated { offset: 1, needed: 4, available: 2 }
        );
        assert_eq!(c.position(), 1);
        assert_eq!(c.read_u16().unwrap(), 0xBBCC);
    }

    #[test]
    fn take_confines_reads_to_the_sub_range() {
        let data = [0, 0, 0, 7, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut c = ByteCursor::new(&data);
        let mut head = c.take(4).unwrap();
        assert_eq!(head.read_u32().unwrap(), 7);
        assert!(head.read_u8().is_err());
        assert_eq!(c.remaining(), 4);
        assert!(c.take(5).is_err());
    }

    #[test]
    fn read_u64_on_empty_buffer_is_an_error() {
        let mut c = ByteCursor::new(&[]);
        assert!(matches!(c.read_u64(), Err(DecodeError::Truncated { needed: 8, .. })));
    }
}
