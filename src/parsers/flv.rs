//! FLV file header and tag header decoding

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader};

use super::cursor::DecodeError;
use crate::constants::{FLV_HEADER_SIZE, FLV_SIGNATURE, FLV_TAG_HEADER_SIZE};

/// 9-byte FLV signature header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    pub data_offset: u32,
}

/// 11-byte header preceding every tag body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvTagHeader {
    pub filtered: bool,
    pub tag_type: u8,
    pub data_size: u32,
    /// Milliseconds, extended to 32 bits
    pub timestamp: u32,
    pub stream_id: u32,
}

fn short(needed: usize, available: usize) -> DecodeError {
    DecodeError::Truncated { offset: 0, needed, available }
}

pub fn parse_flv_header(data: &[u8]) -> Result<FlvHeader, DecodeError> {
    if data.len() < FLV_HEADER_SIZE {
        return Err(short(FLV_HEADER_SIZE, data.len()));
    }
    if data[..3] != FLV_SIGNATURE {
        return Err(DecodeError::BadSignature);
    }

    let mut br = BitReader::endian(&data[3..FLV_HEADER_SIZE], BigEndian);
    let header = read_flv_header(&mut br).map_err(|_| short(FLV_HEADER_SIZE, data.len()))?;

    if (header.data_offset as usize) < FLV_HEADER_SIZE {
        return Err(DecodeError::InvalidSize { offset: 5, size: header.data_offset as u64 });
    }
    Ok(header)
}

pub fn parse_tag_header(data: &[u8]) -> Result<FlvTagHeader, DecodeError> {
    if data.len() < FLV_TAG_HEADER_SIZE {
        return Err(short(FLV_TAG_HEADER_SIZE, data.len()));
    }

    let mut br = BitReader::endian(&data[..FLV_TAG_HEADER_SIZE], BigEndian);
    read_tag_header(&mut br).map_err(|_| short(FLV_TAG_HEADER_SIZE, data.len()))
}

fn read_flv_header<R: BitRead>(br: &mut R) -> io::Result<FlvHeader> {
    let version = br.read::<8, u8>()?;
    br.skip(5)?; // TypeFlagsReserved
    let has_audio = br.read_bit()?;
    br.skip(1)?;
    let has_video = br.read_bit()?;
    let data_offset = br.read::<32, u32>()?;
    Ok(FlvHeader { version, has_audio, has_video, data_offset })
}

fn read_tag_header<R: BitRead>(br: &mut R) -> io::Result<FlvTagHeader> {
    br.skip(2)?; // Reserved
    let filtered = br.read_bit()?;
    let tag_type = br.read::<5, u8>()?;
    let data_size = br.read::<24, u32>()?;
    let ts_low = br.read::<24, u32>()?;
    let ts_ext = br.read::<8, u32>()?;
    let stream_id = br.read::<24, u32>()?;
    Ok(FlvTagHeader {
        filtered,
        tag_type,
        data_size,
        timestamp: (ts_ext << 24) | ts_low,
        stream_id,
    })
}
