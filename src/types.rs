use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use crate::constants::*;
use crate::parsers::FourCc;

/// Framing of the stream a unit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// FLV tags: type 8 audio, 9 video, 18 script
    Tag,
    /// ISO-BMFF boxes from a fragmented MP4 stream
    Box,
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamFormat::Tag => f.write_str("flv"),
            StreamFormat::Box => f.write_str("fmp4"),
        }
    }
}

/// Set of unit kinds, used both as a unit's classification and as a
/// metric's capability mask
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct KindMask(u8);

impl KindMask {
    pub const NONE: KindMask = KindMask(0);
    pub const CONTROL: KindMask = KindMask(0x01);
    pub const AUDIO: KindMask = KindMask(0x02);
    pub const VIDEO: KindMask = KindMask(0x04);
    pub const SCRIPT: KindMask = KindMask(0x08);
    pub const TIME: KindMask = KindMask(0x10);
    pub const UNKNOWN: KindMask = KindMask(0x20);

    pub const MEDIA: KindMask = KindMask(Self::AUDIO.0 | Self::VIDEO.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: KindMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: KindMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for KindMask {
    type Output = KindMask;

    fn bitor(self, rhs: KindMask) -> KindMask {
        KindMask(self.0 | rhs.0)
    }
}

impl fmt::Debug for KindMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(KindMask, &str); 6] = [
            (KindMask::CONTROL, "control"),
            (KindMask::AUDIO, "audio"),
            (KindMask::VIDEO, "video"),
            (KindMask::SCRIPT, "script"),
            (KindMask::TIME, "time"),
            (KindMask::UNKNOWN, "unknown"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, n)| *n)
            .collect();
        write!(f, "KindMask({})", names.join("|"))
    }
}

/// Audio or video, the two kinds every windowed metric reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_tag_type(tag_type: u32) -> Option<Self> {
        match tag_type {
            t if t == FLV_TAG_AUDIO as u32 => Some(MediaKind::Audio),
            t if t == FLV_TAG_VIDEO as u32 => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Maps fragment track ids to media kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMap {
    pub video: u32,
    pub audio: u32,
}

impl TrackMap {
    pub fn kind_of(&self, track_id: u32) -> Option<MediaKind> {
        if track_id == self.video {
            Some(MediaKind::Video)
        } else if track_id == self.audio {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

impl Default for TrackMap {
    fn default() -> Self {
        Self { video: DEFAULT_VIDEO_TRACK_ID, audio: DEFAULT_AUDIO_TRACK_ID }
    }
}

/// One top-level record handed over by the transport. The body is borrowed
/// for the duration of a single dispatch.
#[derive(Debug, Clone, Copy)]
pub struct MediaUnit<'a> {
    pub format: StreamFormat,
    /// Tag type, or the box fourcc as a big-endian integer
    pub unit_type: u32,
    /// Tag data size, or the box size including its header
    pub declared_len: u64,
    pub body: &'a [u8],
}

impl<'a> MediaUnit<'a> {
    pub fn tag(tag_type: u8, body: &'a [u8]) -> Self {
        Self {
            format: StreamFormat::Tag,
            unit_type: tag_type as u32,
            declared_len: body.len() as u64,
            body,
        }
    }

    pub fn boxed(fourcc: FourCc, declared_len: u64, body: &'a [u8]) -> Self {
        Self { format: StreamFormat::Box, unit_type: fourcc.as_u32(), declared_len, body }
    }

    pub fn fourcc(&self) -> Option<FourCc> {
        match self.format {
            StreamFormat::Box => Some(FourCc::from_u32(self.unit_type)),
            StreamFormat::Tag => None,
        }
    }

    /// A-priori classification used for capability-mask filtering.
    ///
    /// Fragment headers and payload boxes may belong to either track, so they
    /// classify as audio|video and the metric resolves the track itself.
    pub fn kinds(&self) -> KindMask {
        match self.format {
            StreamFormat::Tag => match self.unit_type {
                t if t == FLV_TAG_AUDIO as u32 => KindMask::AUDIO,
                t if t == FLV_TAG_VIDEO as u32 => KindMask::VIDEO,
                t if t == FLV_TAG_SCRIPT as u32 => KindMask::SCRIPT,
                _ => KindMask::UNKNOWN,
            },
            StreamFormat::Box => match FourCc::from_u32(self.unit_type) {
                FourCc::MOOF | FourCc::MDAT => KindMask::MEDIA,
                FourCc::EGWC => KindMask::TIME,
                FourCc::FTYP | FourCc::STYP | FourCc::MOOV | FourCc::SIDX | FourCc::FREE
                | FourCc::SKIP => KindMask::CONTROL,
                _ => KindMask::UNKNOWN,
            },
        }
    }
}

/// Configuration options for the daemon
#[derive(Debug, Clone)]
pub struct Options {
    pub source_url: String,
    pub sink_addr: String,
    pub stream_timeout: Duration,
    pub reconnect_interval: Duration,
    pub sink_timeout: Duration,
}

impl Options {
    pub fn new(source_url: impl Into<String>, sink_addr: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            sink_addr: sink_addr.into(),
            stream_timeout: Duration::from_millis(STREAM_TIMEOUT_MS),
            reconnect_interval: Duration::from_millis(RECONNECT_INTERVAL_MS),
            sink_timeout: Duration::from_secs(SINK_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_classify_by_type() {
        assert_eq!(MediaUnit::tag(8, &[]).kinds(), KindMask::AUDIO);
        assert_eq!(MediaUnit::tag(9, &[]).kinds(), KindMask::VIDEO);
        assert_eq!(MediaUnit::tag(18, &[]).kinds(), KindMask::SCRIPT);
        assert_eq!(MediaUnit::tag(3, &[]).kinds(), KindMask::UNKNOWN);
    }

    #[test]
    fn boxes_classify_by_fourcc() {
        assert_eq!(MediaUnit::boxed(FourCc::MOOF, 8, &[]).kinds(), KindMask::MEDIA);
        assert_eq!(MediaUnit::boxed(FourCc::MDAT, 8, &[]).kinds(), KindMask::MEDIA);
        assert_eq!(MediaUnit::boxed(FourCc::EGWC, 8, &[]).kinds(), KindMask::TIME);
        assert_eq!(MediaUnit::boxed(FourCc::MOOV, 8, &[]).kinds(), KindMask::CONTROL);
        assert_eq!(MediaUnit::boxed(FourCc(*b"uuid"), 8, &[]).kinds(), KindMask::UNKNOWN);
    }

    #[test]
    fn mask_set_operations() {
        let m = KindMask::AUDIO | KindMask::TIME;
        assert!(m.contains(KindMask::AUDIO));
        assert!(!m.contains(KindMask::MEDIA));
        assert!(m.intersects(KindMask::MEDIA));
        assert!(!m.intersects(KindMask::SCRIPT | KindMask::CONTROL));
        assert_eq!(format!("{m:?}"), "KindMask(audio|time)");
    }

    #[test]
    fn track_map_defaults_to_video_one_audio_two() {
        let t = TrackMap::default();
        assert_eq!(t.kind_of(1), Some(MediaKind::Video));
        assert_eq!(t.kind_of(2), Some(MediaKind::Audio));
        assert_eq!(t.kind_of(3), None);
    }
}
