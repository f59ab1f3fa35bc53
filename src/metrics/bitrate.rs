//! Audio/video bitrate in bits per second

use tracing::trace;

use super::{fragment_kind, EmitContext, Metric, MetricDescriptor, MetricError};
use crate::constants::MAX_MEDIA_FRAME_SIZE;
use crate::parsers::FourCc;
use crate::report::write_kind_rates;
use crate::stats::{per_second, IntervalWindow, PerKind};
use crate::types::{KindMask, MediaKind, MediaUnit, StreamFormat, TrackMap};

pub(super) const DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "MEDIA_STREAM_BITRATE",
    summary: "audio/video payload bitrate (bits/s)",
    mask: KindMask::MEDIA,
    create,
};

fn create(tracks: &TrackMap) -> Box<dyn Metric> {
    Box::new(MediaStreamBitrate::new(*tracks))
}

/// On FLV each audio/video tag counts its data size. On fMP4 a `moof` names
/// the track the following `mdat` belongs to, and the `mdat` box size is
/// attributed to that track.
pub struct MediaStreamBitrate {
    tracks: TrackMap,
    window: IntervalWindow,
    pending: Option<MediaKind>,
    bytes: PerKind<u64>,
}

impl MediaStreamBitrate {
    pub fn new(tracks: TrackMap) -> Self {
        Self { tracks, window: IntervalWindow::new(), pending: None, bytes: PerKind::default() }
    }

    fn accumulate(&mut self, kind: Option<MediaKind>, size: u64) {
        if size == 0 || size > MAX_MEDIA_FRAME_SIZE {
            trace!(size, "payload size outside sanity range, ignored");
            return;
        }
        if let Some(kind) = kind {
            *self.bytes.get_mut(kind) += size;
        }
    }
}

impl Metric for MediaStreamBitrate {
    fn emit(&mut self, cx: &mut EmitContext<'_>, unit: &MediaUnit<'_>) -> Result<(), MetricError> {
        match unit.format {
            StreamFormat::Tag => match MediaKind::from_tag_type(unit.unit_type) {
                Some(kind) => self.accumulate(Some(kind), unit.declared_len),
                None => return Ok(()),
            },
            StreamFormat::Box => match unit.fourcc() {
                Some(FourCc::MOOF) => {
                    // the remembered track persists until the next fragment header
                    self.pending = fragment_kind(unit, &self.tracks, DESCRIPTOR.name);
                }
                Some(FourCc::MDAT) => self.accumulate(self.pending, unit.declared_len),
                _ => return Ok(()),
            },
        }

        let Some(elapsed) = self.window.poll(cx.now_ms, cx.settings.interval_ms) else {
            return Ok(());
        };
        let bytes = self.bytes.take();
        let rates = PerKind {
            audio: per_second(bytes.audio * 8, elapsed),
            video: per_second(bytes.video * 8, elapsed),
        };
        write_kind_rates(cx.out, &cx.settings.path, rates, cx.now_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricSettings;
    use crate::metrics::testing::{lines, moof_body};

    fn emit_at(m: &mut MediaStreamBitrate, out: &mut Vec<u8>, now_ms: u64, unit: MediaUnit<'_>) {
        let settings = MetricSettings { path: "live.br".into(), interval_ms: 1000 };
        let mut cx = EmitContext { settings: &settings, now_ms, out };
        m.emit(&mut cx, &unit).unwrap();
    }

    #[test]
    fn fragment_header_attributes_next_payload() {
        let mut m = MediaStreamBitrate::new(TrackMap::default());
        let mut out = Vec::new();
        let audio = moof_body(2);
        let video = moof_body(1);

        emit_at(&mut m, &mut out, 20_000, MediaUnit::boxed(FourCc::MOOF, 40, &audio));
        emit_at(&mut m, &mut out, 20_001, MediaUnit::boxed(FourCc::MDAT, 1_000, &[]));
        emit_at(&mut m, &mut out, 20_100, MediaUnit::boxed(FourCc::MOOF, 40, &video));
        emit_at(&mut m, &mut out, 20_101, MediaUnit::boxed(FourCc::MDAT, 25_000, &[]));
        emit_at(&mut m, &mut out, 21_000, MediaUnit::boxed(FourCc::MOOF, 40, &audio));
        assert_eq!(lines(&out), ["live.br.audio 8000.00 21", "live.br.video 200000.00 21"]);
        assert_eq!(m.bytes, PerKind::default());
    }

    #[test]
    fn zero_and_oversized_payloads_are_ignored() {
        let mut m = MediaStreamBitrate::new(TrackMap::default());
        let mut out = Vec::new();
        let video = moof_body(1);

        emit_at(&mut m, &mut out, 0, MediaUnit::boxed(FourCc::MOOF, 40, &video));
        emit_at(&mut m, &mut out, 1, MediaUnit::boxed(FourCc::MDAT, 0, &[]));
        emit_at(&mut m, &mut out, 2, MediaUnit::boxed(FourCc::MDAT, MAX_MEDIA_FRAME_SIZE + 1, &[]));
        assert_eq!(m.bytes, PerKind::default());

        emit_at(&mut m, &mut out, 3, MediaUnit::boxed(FourCc::MDAT, MAX_MEDIA_FRAME_SIZE, &[]));
        assert_eq!(m.bytes.video, MAX_MEDIA_FRAME_SIZE);
    }

    #[test]
    fn payload_without_known_track_is_dropped() {
        let mut m = MediaStreamBitrate::new(TrackMap::default());
        let mut out = Vec::new();
        emit_at(&mut m, &mut out, 0, MediaUnit::boxed(FourCc::MDAT, 500, &[]));
        let unmapped = moof_body(3);
        emit_at(&mut m, &mut out, 1, MediaUnit::boxed(FourCc::MOOF, 40, &unmapped));
        emit_at(&mut m, &mut out, 2, MediaUnit::boxed(FourCc::MDAT, 500, &[]));
        assert_eq!(m.bytes, PerKind::default());
    }

    #[test]
    fn flv_tags_count_their_data_size() {
        let mut m = MediaStreamBitrate::new(TrackMap::default());
        let mut out = Vec::new();
        let audio = [0u8; 250];
        let video = [0u8; 4000];
        emit_at(&mut m, &mut out, 5_000, MediaUnit::tag(8, &audio));
        emit_at(&mut m, &mut out, 5_200, MediaUnit::tag(9, &video));
        emit_at(&mut m, &mut out, 5_300, MediaUnit::tag(18, &video));
        emit_at(&mut m, &mut out, 5_400, MediaUnit::tag(9, &[]));
        emit_at(&mut m, &mut out, 6_000, MediaUnit::tag(8, &audio));
        assert_eq!(lines(&out), ["live.br.audio 4000.00 6", "live.br.video 32000.00 6"]);
    }
}
