//! Constants for FLV / fragmented-MP4 unit handling and daemon defaults

/// Daemon defaults (overridable from the command line)
pub const STREAM_TIMEOUT_MS: u64 = 60 * 1000;     // no unit for this long => reconnect
pub const RECONNECT_INTERVAL_MS: u64 = 3000;      // fixed back-off between attempts
pub const SINK_TIMEOUT_SECS: u64 = 15;            // connect / send / receive on the sink socket

/// Sink address selecting stdout instead of a network connection
pub const PASSTHROUGH_SINK: &str = "-";

/// Metric registry limits
pub const MAX_METRICS: usize = 256;
pub const MAX_PATH_LEN: usize = 256;

/// Payload units larger than this are not attributed to bitrate
pub const MAX_MEDIA_FRAME_SIZE: u64 = 4 * 1024 * 1024;

/// Largest unit body the readers will buffer
pub const MAX_UNIT_SIZE: u64 = 16 * 1024 * 1024;

/// Default track ids inside fragment headers
pub const DEFAULT_VIDEO_TRACK_ID: u32 = 1;
pub const DEFAULT_AUDIO_TRACK_ID: u32 = 2;

/// FLV constants
pub const FLV_SIGNATURE: [u8; 3] = *b"FLV";
pub const FLV_HEADER_SIZE: usize = 9;
pub const FLV_TAG_HEADER_SIZE: usize = 11;
pub const FLV_PREV_TAG_SIZE: usize = 4;
pub const FLV_TAG_AUDIO: u8 = 8;
pub const FLV_TAG_VIDEO: u8 = 9;
pub const FLV_TAG_SCRIPT: u8 = 18;

/// ISO-BMFF box header sizes
pub const BOX_HEADER_SIZE: usize = 8;
pub const BOX_LARGE_HEADER_SIZE: usize = 16;
pub const FULL_BOX_HEADER_SIZE: usize = 4; // version + flags, after the box header
