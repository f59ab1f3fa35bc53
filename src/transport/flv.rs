use bytes::BytesMut;
use tokio::io::AsyncRead;
use tracing::debug;

use super::{read_body, read_header, TransportError};
use crate::constants::{FLV_HEADER_SIZE, FLV_PREV_TAG_SIZE, FLV_TAG_HEADER_SIZE};
use crate::parsers::{parse_flv_header, parse_tag_header};
use crate::types::MediaUnit;

/// Splits an FLV byte stream into tags
pub struct FlvReader<R> {
    reader: R,
    started: bool,
    body: BytesMut,
}

impl<R: AsyncRead + Unpin> FlvReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, started: false, body: BytesMut::new() }
    }

    async fn read_signature(&mut self) -> Result<bool, TransportError> {
        let mut raw = [0u8; FLV_HEADER_SIZE];
        if !read_header(&mut self.reader, &mut raw).await? {
            return Ok(false);
        }
        let header = parse_flv_header(&raw)?;
        debug!(
            version = header.version,
            audio = header.has_audio,
            video = header.has_video,
            data_offset = header.data_offset,
            "flv header"
        );
        // vendor extension bytes between the header and the first tag
        let extra = header.data_offset as u64 - FLV_HEADER_SIZE as u64;
        if extra > 0 {
            read_body(&mut self.reader, &mut self.body, extra).await?;
        }
        self.started = true;
        Ok(true)
    }

    /// Next tag, or `None` at a clean end of stream. The trailing
    /// PreviousTagSize of the last tag may end the stream.
    pub async fn next_unit(&mut self) -> Result<Option<MediaUnit<'_>>, TransportError> {
        if !self.started && !self.read_signature().await? {
            return Ok(None);
        }

        let mut prev = [0u8; FLV_PREV_TAG_SIZE];
        if !read_header(&mut self.reader, &mut prev).await? {
            return Ok(None);
        }
        let mut raw = [0u8; FLV_TAG_HEADER_SIZE];
        if !read_header(&mut self.reader, &mut raw).await? {
            return Ok(None);
        }
        let tag = parse_tag_header(&raw)?;
        read_body(&mut self.reader, &mut self.body, tag.data_size as u64).await?;

        Ok(Some(MediaUnit::tag(tag.tag_type, &self.body)))
    }
}
