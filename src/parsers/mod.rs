//! Field extraction from FLV tags and fragmented-MP4 boxes
//!
//! Everything here works on borrowed buffers and is bounds checked: a
//! malformed or truncated record yields a [`DecodeError`], never a panic.

mod boxes;
mod cursor;
mod flv;

pub use boxes::{
    children, encode_box, find_child, fragment_track_id, read_box, wallclock_micros, BoxRecord,
    FourCc,
};
pub use cursor::{ByteCursor, DecodeError};
pub use flv::{parse_flv_header, parse_tag_header, FlvHeader, FlvTagHeader};
