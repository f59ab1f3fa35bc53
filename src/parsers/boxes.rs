// parsers/boxes.rs
//! ISO-BMFF (fragmented MP4) box walking.
//!
//! A box is `size:u32 | type:fourcc | body`, where `size` covers the header.
//! `size == 1` means a 64-bit largesize follows the type, `size == 0` means
//! the box runs to the end of the enclosing buffer.

use std::fmt;

use super::cursor::{ByteCursor, DecodeError};
use crate::constants::{BOX_HEADER_SIZE, BOX_LARGE_HEADER_SIZE, FULL_BOX_HEADER_SIZE};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const FTYP: FourCc = FourCc(*b"ftyp");
    pub const STYP: FourCc = FourCc(*b"styp");
    pub const MOOV: FourCc = FourCc(*b"moov");
    pub const SIDX: FourCc = FourCc(*b"sidx");
    pub const FREE: FourCc = FourCc(*b"free");
    pub const SKIP: FourCc = FourCc(*b"skip");
    pub const MOOF: FourCc = FourCc(*b"moof");
    pub const MFHD: FourCc = FourCc(*b"mfhd");
    pub const TRAF: FourCc = FourCc(*b"traf");
    pub const TFHD: FourCc = FourCc(*b"tfhd");
    pub const MDAT: FourCc = FourCc(*b"mdat");
    /// Embedded wallclock marker inserted by the packager
    pub const EGWC: FourCc = FourCc(*b"egwc");

    pub fn from_u32(code: u32) -> Self {
        FourCc(code.to_be_bytes())
    }

    pub fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

/// One box inside a buffer, body excluding the header
#[derive(Debug, Clone, Copy)]
pub struct BoxRecord<'a> {
    pub fourcc: FourCc,
    pub size: u64,
    pub body: &'a [u8],
}

/// Reads one box at the cursor and advances past it.
pub fn read_box<'a>(cursor: &mut ByteCursor<'a>) -> Result<BoxRecord<'a>, DecodeError> {
    let offset = cursor.position();
    let available = cursor.remaining();
    let size32 = cursor.read_u32()?;
    let fourcc = cursor.read_fourcc()?;

    let (size, header) = match size32 {
        0 => (available as u64, BOX_HEADER_SIZE),
        1 => (cursor.read_u64()?, BOX_LARGE_HEADER_SIZE),
        n => (n as u64, BOX_HEADER_SIZE),
    };
    if size < header as u64 {
        return Err(DecodeError::InvalidSize { offset, size });
    }
    let body_len = usize::try_from(size - header as u64)
        .map_err(|_| DecodeError::InvalidSize { offset, size })?;
    let body = cursor.take(body_len)?.rest();

    Ok(BoxRecord { fourcc, size, body })
}

/// Iterates sibling boxes by following declared sizes; stops after the first error.
pub struct Children<'a> {
    cursor: ByteCursor<'a>,
    failed: bool,
}

pub fn children(body: &[u8]) -> Children<'_> {
    Children { cursor: ByteCursor::new(body), failed: false }
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<BoxRecord<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        let rec = read_box(&mut self.cursor);
        self.failed = rec.is_err();
        Some(rec)
    }
}

/// First child of `body` with the given type.
pub fn find_child(body: &[u8], fourcc: FourCc) -> Result<BoxRecord<'_>, DecodeError> {
    for child in children(body) {
        let child = child?;
        if child.fourcc == fourcc {
            return Ok(child);
        }
    }
    Err(DecodeError::Missing(fourcc))
}

fn first_child(body: &[u8], expected: FourCc) -> Result<BoxRecord<'_>, DecodeError> {
    let child = children(body).next().ok_or(DecodeError::Missing(expected))??;
    if child.fourcc != expected {
        return Err(DecodeError::UnexpectedType { expected, found: child.fourcc });
    }
    Ok(child)
}

/// Track id of a movie fragment: `moof` -> `traf` -> first child `tfhd` -> track_ID.
pub fn fragment_track_id(moof_body: &[u8]) -> Result<u32, DecodeError> {
    let traf = find_child(moof_body, FourCc::TRAF)?;
    let tfhd = first_child(traf.body, FourCc::TFHD)?;
    let mut c = ByteCursor::new(tfhd.body);
    c.skip(FULL_BOX_HEADER_SIZE)?;
    c.read_u32()
}

/// Sender wallclock carried by an `egwc` body, microseconds since the UNIX epoch.
pub fn wallclock_micros(egwc_body: &[u8]) -> Result<u64, DecodeError> {
    let mut c = ByteCursor::new(egwc_body);
    c.skip(FULL_BOX_HEADER_SIZE)?;
    c.read_u64()
}

/// Test and tooling helper: serialises a box with a 32-bit size header.
pub fn encode_box(fourcc: FourCc, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BOX_HEADER_SIZE + body.len());
    out.extend_from_slice(&((BOX_HEADER_SIZE + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(&fourcc.0);
    out.extend_from_slice(body);
    out
}
