//! Audio/video frames per second

use super::{frame_kind, EmitContext, Metric, MetricDescriptor, MetricError};
use crate::report::write_kind_rates;
use crate::stats::{per_second, IntervalWindow, PerKind};
use crate::types::{KindMask, MediaUnit, TrackMap};

pub(super) const DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "FRAMES_PER_SECOND",
    summary: "audio/video frames (tags or fragments) per second",
    mask: KindMask::MEDIA,
    create,
};

fn create(tracks: &TrackMap) -> Box<dyn Metric> {
    Box::new(FramesPerSecond::new(*tracks))
}

/// Counts one frame per audio/video tag, or per fragment header of a mapped
/// track on fMP4 streams.
pub struct FramesPerSecond {
    tracks: TrackMap,
    window: IntervalWindow,
    frames: PerKind<u64>,
}

impl FramesPerSecond {
    pub fn new(tracks: TrackMap) -> Self {
        Self { tracks, window: IntervalWindow::new(), frames: PerKind::default() }
    }
}

impl Metric for FramesPerSecond {
    fn emit(&mut self, cx: &mut EmitContext<'_>, unit: &MediaUnit<'_>) -> Result<(), MetricError> {
        let Some(kind) = frame_kind(unit, &self.tracks, DESCRIPTOR.name) else {
            return Ok(());
        };
        *self.frames.get_mut(kind) += 1;

        let Some(elapsed) = self.window.poll(cx.now_ms, cx.settings.interval_ms) else {
            return Ok(());
        };
        let frames = self.frames.take();
        let rates = PerKind {
            audio: per_second(frames.audio, elapsed),
            video: per_second(frames.video, elapsed),
        };
        write_kind_rates(cx.out, &cx.settings.path, rates, cx.now_ms)?;
        Ok(())
    }
}
