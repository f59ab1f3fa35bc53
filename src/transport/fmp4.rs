use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::{read_body, read_header, TransportError};
use crate::constants::{BOX_HEADER_SIZE, BOX_LARGE_HEADER_SIZE, MAX_UNIT_SIZE};
use crate::parsers::{ByteCursor, DecodeError};
use crate::types::MediaUnit;

/// Splits a fragmented MP4 byte stream into top-level boxes
pub struct BoxReader<R> {
    reader: R,
    offset: u64,
    body: BytesMut,
}

impl<R: AsyncRead + Unpin> BoxReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0, body: BytesMut::new() }
    }

    /// Next box, or `None` at a clean end of stream. A box of size 0 runs to
    /// the end of the stream.
    pub async fn next_unit(&mut self) -> Result<Option<MediaUnit<'_>>, TransportError> {
        let mut raw = [0u8; BOX_HEADER_SIZE];
        if !read_header(&mut self.reader, &mut raw).await? {
            return Ok(None);
        }
        let mut header = ByteCursor::new(&raw);
        let size32 = header.read_u32()?;
        let fourcc = header.read_fourcc()?;

        let (declared, header_len) = match size32 {
            0 => {
                self.read_to_end().await?;
                let declared = BOX_HEADER_SIZE as u64 + self.body.len() as u64;
                trace!(%fourcc, size = declared, "box runs to end of stream");
                self.offset += declared;
                return Ok(Some(MediaUnit::boxed(fourcc, declared, &self.body)));
            }
            1 => {
                let mut large = [0u8; 8];
                self.reader.read_exact(&mut large).await?;
                (u64::from_be_bytes(large), BOX_LARGE_HEADER_SIZE as u64)
            }
            n => (n as u64, BOX_HEADER_SIZE as u64),
        };
        if declared < header_len {
            return Err(DecodeError::InvalidSize { offset: self.offset as usize, size: declared }.into());
        }
        trace!(%fourcc, size = declared, offset = self.offset, "box");
        read_body(&mut self.reader, &mut self.body, declared - header_len).await?;
        self.offset += declared;

        Ok(Some(MediaUnit::boxed(fourcc, declared, &self.body)))
    }

    async fn read_to_end(&mut self) -> Result<(), TransportError> {
        self.body.clear();
        let mut limited = (&mut self.reader).take(MAX_UNIT_SIZE + 1);
        while limited.read_buf(&mut self.body).await? > 0 {}
        if self.body.len() as u64 > MAX_UNIT_SIZE {
            return Err(TransportError::Oversized { size: self.body.len() as u64, limit: MAX_UNIT_SIZE });
        }
        Ok(())
    }
}
