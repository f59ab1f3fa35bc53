//! Maximum gap between consecutive frames of the same kind

use super::{frame_kind, EmitContext, Metric, MetricDescriptor, MetricError};
use crate::report::write_kind_counts;
use crate::stats::{IntervalWindow, PerKind};
use crate::types::{KindMask, MediaUnit, TrackMap};

pub(super) const DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "FRAME_INTERARRIVAL_TIME",
    summary: "maximum audio/video frame inter-arrival gap (ms)",
    mask: KindMask::MEDIA,
    create,
};

fn create(tracks: &TrackMap) -> Box<dyn Metric> {
    Box::new(FrameInterarrivalTime::new(*tracks))
}

pub struct FrameInterarrivalTime {
    tracks: TrackMap,
    window: IntervalWindow,
    last_seen_ms: PerKind<Option<u64>>,
    max_gap_ms: PerKind<u64>,
}

impl FrameInterarrivalTime {
    pub fn new(tracks: TrackMap) -> Self {
        Self {
            tracks,
            window: IntervalWindow::new(),
            last_seen_ms: PerKind::default(),
            max_gap_ms: PerKind::default(),
        }
    }
}

impl Metric for FrameInterarrivalTime {
    fn emit(&mut self, cx: &mut EmitContext<'_>, unit: &MediaUnit<'_>) -> Result<(), MetricError> {
        let Some(kind) = frame_kind(unit, &self.tracks, DESCRIPTOR.name) else {
            return Ok(());
        };
        let now = cx.now_ms;

        let last_seen = self.last_seen_ms.get_mut(kind);
        if let Some(prev) = *last_seen {
            if now < prev {
                return Ok(());
            }
            let max = self.max_gap_ms.get_mut(kind);
            *max = (*max).max(now - prev);
        }
        *last_seen = Some(now);

        // no warm-up: the window opens with the first frame
        self.window.observe(now);
        if self.window.close_if_due(now, cx.settings.interval_ms).is_some() {
            write_kind_counts(cx.out, &cx.settings.path, ".max", self.max_gap_ms.take(), now)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricSettings;
    use crate::metrics::testing::{lines, moof_body};
    use crate::parsers::FourCc;

    fn emit_at(m: &mut FrameInterarrivalTime, out: &mut Vec<u8>, now_ms: u64, unit: MediaUnit<'_>) {
        let settings = MetricSettings { path: "live.iat".into(), interval_ms: 1000 };
        let mut cx = EmitContext { settings: &settings, now_ms, out };
        m.emit(&mut cx, &unit).unwrap();
    }

    #[test]
    fn reports_max_gap_per_kind_and_keeps_last_seen() {
        let mut m = FrameInterarrivalTime::new(TrackMap::default());
        let mut out = Vec::new();
        let t0 = 1_700_000_000_000;

        emit_at(&mut m, &mut out, t0, MediaUnit::tag(9, &[]));
        emit_at(&mut m, &mut out, t0 + 40, MediaUnit::tag(9, &[]));
        emit_at(&mut m, &mut out, t0 + 50, MediaUnit::tag(8, &[]));
        emit_at(&mut m, &mut out, t0 + 120, MediaUnit::tag(9, &[]));
        emit_at(&mut m, &mut out, t0 + 73, MediaUnit::tag(8, &[]));
        assert!(out.is_empty());

        emit_at(&mut m, &mut out, t0 + 1000, MediaUnit::tag(8, &[]));
        assert_eq!(
            lines(&out),
            ["live.iat.audio.max 927 1700000001", "live.iat.video.max 80 1700000001"]
        );

        // maxima reset, last-seen kept: next video gap measured from t0+120
        out.clear();
        emit_at(&mut m, &mut out, t0 + 2000, MediaUnit::tag(9, &[]));
        assert_eq!(
            lines(&out),
            ["live.iat.audio.max 0 1700000002", "live.iat.video.max 1880 1700000002"]
        );
    }

    #[test]
    fn backwards_clock_sample_is_skipped() {
        let mut m = FrameInterarrivalTime::new(TrackMap::default());
        let mut out = Vec::new();
        emit_at(&mut m, &mut out, 5000, MediaUnit::tag(8, &[]));
        emit_at(&mut m, &mut out, 4000, MediaUnit::tag(8, &[]));
        emit_at(&mut m, &mut out, 5100, MediaUnit::tag(8, &[]));
        emit_at(&mut m, &mut out, 6000, MediaUnit::tag(9, &[]));
        assert_eq!(lines(&out), ["live.iat.audio.max 100 6", "live.iat.video.max 0 6"]);
    }

    #[test]
    fn fragment_headers_classify_by_track_id() {
        let mut m = FrameInterarrivalTime::new(TrackMap::default());
        let mut out = Vec::new();
        let video = moof_body(1);
        let audio = moof_body(2);
        let other = moof_body(7);
        let garbage = [0xFF; 6];

        emit_at(&mut m, &mut out, 10_000, MediaUnit::boxed(FourCc::MOOF, 8, &video));
        emit_at(&mut m, &mut out, 10_033, MediaUnit::boxed(FourCc::MOOF, 8, &video));
        emit_at(&mut m, &mut out, 10_010, MediaUnit::boxed(FourCc::MOOF, 8, &audio));
        emit_at(&mut m, &mut out, 10_500, MediaUnit::boxed(FourCc::MOOF, 8, &other));
        emit_at(&mut m, &mut out, 10_600, MediaUnit::boxed(FourCc::MOOF, 8, &garbage));
        emit_at(&mut m, &mut out, 10_700, MediaUnit::boxed(FourCc::MDAT, 8, &video));
        emit_at(&mut m, &mut out, 11_000, MediaUnit::boxed(FourCc::MOOF, 8, &audio));
        assert_eq!(lines(&out), ["live.iat.audio.max 990 11", "live.iat.video.max 33 11"]);
    }
}
