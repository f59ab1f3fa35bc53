//! Queue-to-queue wall-clock latency from `egwc` boxes

use super::{EmitContext, Metric, MetricDescriptor, MetricError};
use crate::parsers::{wallclock_micros, FourCc};
use crate::report::write_value;
use crate::stats::IntervalWindow;
use crate::types::{KindMask, MediaUnit, TrackMap};

use tracing::debug;

pub(super) const DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "QUEUE_TO_QUEUE_WALLCLOCK_LATENCY",
    summary: "mean delay between the embedded encoder wall clock and arrival (ms)",
    mask: KindMask::TIME,
    create,
};

fn create(_tracks: &TrackMap) -> Box<dyn Metric> {
    Box::new(WallclockLatency::new())
}

/// Averages `now - stream_wallclock` over each interval. Samples taken
/// during the first interval are discarded.
#[derive(Debug, Default)]
pub struct WallclockLatency {
    window: IntervalWindow,
    sum_ms: u64,
    samples: u64,
}

impl WallclockLatency {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for WallclockLatency {
    fn emit(&mut self, cx: &mut EmitContext<'_>, unit: &MediaUnit<'_>) -> Result<(), MetricError> {
        if unit.fourcc() != Some(FourCc::EGWC) {
            return Ok(());
        }
        let stream_ms = match wallclock_micros(unit.body) {
            Ok(us) => us / 1000,
            Err(e) => {
                debug!(metric = DESCRIPTOR.name, "skipping undecodable wall-clock box: {e}");
                return Ok(());
            }
        };
        let now = cx.now_ms;
        if stream_ms == 0 || stream_ms > now {
            debug!(stream_ms, now_ms = now, "wall-clock sample outside range, dropped");
            return Ok(());
        }

        self.window.observe(now);
        if self.window.in_warmup(now, cx.settings.interval_ms) {
            return Ok(());
        }
        self.sum_ms = self.sum_ms.saturating_add(now - stream_ms);
        self.samples += 1;

        if self.window.close_if_due(now, cx.settings.interval_ms).is_some() {
            let mean = self.sum_ms / self.samples;
            self.sum_ms = 0;
            self.samples = 0;
            write_value(cx.out, &cx.settings.path, mean, now)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricSettings;
    use crate::metrics::testing::{egwc_body, lines};

    fn emit_at(m: &mut WallclockLatency, out: &mut Vec<u8>, now_ms: u64, stream_ms: u64) {
        let body = egwc_body(stream_ms);
        let unit = MediaUnit::boxed(FourCc::EGWC, 20, &body);
        let settings = MetricSettings { path: "live.q2q".into(), interval_ms: 1000 };
        let mut cx = EmitContext { settings: &settings, now_ms, out };
        m.emit(&mut cx, &unit).unwrap();
    }

    #[test]
    fn mean_is_floored_and_warmup_samples_are_discarded() {
        let mut m = WallclockLatency::new();
        let mut out = Vec::new();
        let t0 = 1_700_000_000_000;

        emit_at(&mut m, &mut out, t0, t0 - 5_000);
        emit_at(&mut m, &mut out, t0 + 500, t0 + 400);
        assert_eq!((m.sum_ms, m.samples), (0, 0));

        emit_at(&mut m, &mut out, t0 + 1000, t0 + 990);
        assert_eq!(lines(&out), ["live.q2q 10 1700000001"]);

        // 30 + 31 + 32 over three samples, floored
        out.clear();
        emit_at(&mut m, &mut out, t0 + 1300, t0 + 1270);
        emit_at(&mut m, &mut out, t0 + 1600, t0 + 1569);
        emit_at(&mut m, &mut out, t0 + 2000, t0 + 1968);
        assert_eq!(lines(&out), ["live.q2q 31 1700000002"]);
    }

    #[test]
    fn future_and_zero_timestamps_are_dropped() {
        let mut m = WallclockLatency::new();
        let mut out = Vec::new();
        emit_at(&mut m, &mut out, 10_000, 10_001);
        emit_at(&mut m, &mut out, 10_000, 0);
        assert!(!m.window.is_open());

        emit_at(&mut m, &mut out, 20_000, 19_900);
        emit_at(&mut m, &mut out, 21_000, 25_000);
        emit_at(&mut m, &mut out, 21_000, 20_950);
        assert_eq!(lines(&out), ["live.q2q 50 21"]);
    }

    #[test]
    fn sum_saturates_instead_of_overflowing() {
        let mut m = WallclockLatency::new();
        let mut out = Vec::new();
        let t = u64::MAX / 1000 - 10_000;

        emit_at(&mut m, &mut out, t, 1);
        emit_at(&mut m, &mut out, t + 1000, 1);
        out.clear();
        for _ in 0..2000 {
            emit_at(&mut m, &mut out, t + 1500, 1);
        }
        emit_at(&mut m, &mut out, t + 2000, 1);

        let expected = format!("live.q2q {} {}", u64::MAX / 2001, (t + 2000) / 1000);
        assert_eq!(lines(&out), [expected]);
    }

    #[test]
    fn other_boxes_and_short_bodies_are_ignored() {
        let mut m = WallclockLatency::new();
        let mut out = Vec::new();
        let settings = MetricSettings { path: "live.q2q".into(), interval_ms: 1000 };
        let mut cx = EmitContext { settings: &settings, now_ms: 5_000, out: &mut out };
        m.emit(&mut cx, &MediaUnit::boxed(FourCc::EGWC, 10, &[0, 0])).unwrap();
        m.emit(&mut cx, &MediaUnit::boxed(FourCc::MDAT, 10, &egwc_body(4_000))).unwrap();
        m.emit(&mut cx, &MediaUnit::tag(9, &egwc_body(4_000))).unwrap();
        assert!(!m.window.is_open());
    }
}
