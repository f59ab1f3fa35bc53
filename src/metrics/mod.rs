//! Metric modules and the startup registry
//!
//! Every compiled-in metric has a static [`MetricDescriptor`] in [`CATALOG`].
//! At startup [`Registry::build`] resolves each descriptor's configuration and
//! instantiates the ones that resolve, in catalog order. The registry never
//! changes shape afterwards.

mod bitrate;
mod fps;
mod interarrival;
mod latency;

use std::io::{self, Write};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigLookup, MetricSettings};
use crate::constants::MAX_METRICS;
use crate::parsers::{fragment_track_id, FourCc};
use crate::types::{KindMask, MediaKind, MediaUnit, StreamFormat, TrackMap};

pub use bitrate::MediaStreamBitrate;
pub use fps::FramesPerSecond;
pub use interarrival::FrameInterarrivalTime;
pub use latency::WallclockLatency;

/// Fatal to the current session
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("failed to write metric line: {0}")]
    Sink(#[from] io::Error),
}

/// What a metric sees besides the unit itself
pub struct EmitContext<'a> {
    pub settings: &'a MetricSettings,
    /// Milliseconds since the UNIX epoch, read once per dispatched unit
    pub now_ms: u64,
    pub out: &'a mut dyn Write,
}

/// Per-metric accumulation state
pub trait Metric: Send {
    fn emit(&mut self, cx: &mut EmitContext<'_>, unit: &MediaUnit<'_>) -> Result<(), MetricError>;
}

/// Immutable definition of a compiled-in metric
pub struct MetricDescriptor {
    /// Configuration key
    pub name: &'static str,
    pub summary: &'static str,
    /// Unit kinds this metric is dispatched
    pub mask: KindMask,
    pub create: fn(&TrackMap) -> Box<dyn Metric>,
}

impl std::fmt::Debug for MetricDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDescriptor")
            .field("name", &self.name)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

pub const CATALOG: &[MetricDescriptor] = &[
    interarrival::DESCRIPTOR,
    fps::DESCRIPTOR,
    bitrate::DESCRIPTOR,
    latency::DESCRIPTOR,
];

const _: () = assert!(CATALOG.len() <= MAX_METRICS);

/// Every compiled-in metric, enabled or not
pub fn supported() -> impl Iterator<Item = &'static MetricDescriptor> {
    CATALOG.iter()
}

/// One enabled metric: descriptor, resolved settings, instance state
pub struct ActiveMetric {
    pub descriptor: &'static MetricDescriptor,
    pub settings: MetricSettings,
    instance: Box<dyn Metric>,
}

impl ActiveMetric {
    pub fn new(
        descriptor: &'static MetricDescriptor,
        settings: MetricSettings,
        instance: Box<dyn Metric>,
    ) -> Self {
        Self { descriptor, settings, instance }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn accepts(&self, kinds: KindMask) -> bool {
        self.descriptor.mask.intersects(kinds)
    }

    pub fn emit(&mut self, unit: &MediaUnit<'_>, now_ms: u64, out: &mut dyn Write) -> Result<(), MetricError> {
        let mut cx = EmitContext { settings: &self.settings, now_ms, out };
        self.instance.emit(&mut cx, unit)
    }
}

/// Track kind named by a fragment header; `None` for other boxes, for
/// undecodable headers and for tracks outside `tracks`.
fn fragment_kind(unit: &MediaUnit<'_>, tracks: &TrackMap, metric: &'static str) -> Option<MediaKind> {
    if unit.fourcc() != Some(FourCc::MOOF) {
        return None;
    }
    match fragment_track_id(unit.body) {
        Ok(track_id) => tracks.kind_of(track_id),
        Err(e) => {
            debug!(metric, "skipping undecodable fragment header: {e}");
            None
        }
    }
}

/// Media kind of a frame-carrying unit: the tag type for FLV, the fragment
/// header's track for fMP4.
fn frame_kind(unit: &MediaUnit<'_>, tracks: &TrackMap, metric: &'static str) -> Option<MediaKind> {
    match unit.format {
        StreamFormat::Tag => MediaKind::from_tag_type(unit.unit_type),
        StreamFormat::Box => fragment_kind(unit, tracks, metric),
    }
}

/// Ordered, startup-fixed set of enabled metrics
pub struct Registry {
    active: Vec<ActiveMetric>,
}

impl Registry {
    /// Resolves every descriptor of `catalog` against `lookup`; the ones that
    /// resolve are instantiated in catalog order.
    pub fn build(
        catalog: &'static [MetricDescriptor],
        lookup: &(impl ConfigLookup + ?Sized),
        tracks: &TrackMap,
    ) -> Self {
        assert!(catalog.len() <= MAX_METRICS, "metric catalog exceeds {MAX_METRICS} entries");

        let mut active = Vec::with_capacity(catalog.len());
        for descriptor in catalog {
            match MetricSettings::resolve(lookup, descriptor.name) {
                Ok(settings) => {
                    info!(
                        metric = descriptor.name,
                        path = %settings.path,
                        interval_ms = settings.interval_ms,
                        "metric enabled"
                    );
                    let instance = (descriptor.create)(tracks);
                    active.push(ActiveMetric::new(descriptor, settings, instance));
                }
                Err(e) => debug!(metric = descriptor.name, "metric disabled: {e}"),
            }
        }
        Self { active }
    }

    pub fn from_active(active: Vec<ActiveMetric>) -> Self {
        assert!(active.len() <= MAX_METRICS, "registry exceeds {MAX_METRICS} entries");
        Self { active }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.active.iter().map(ActiveMetric::name)
    }

    pub(crate) fn entries_mut(&mut self) -> std::slice::IterMut<'_, ActiveMetric> {
        self.active.iter_mut()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::parsers::{encode_box, FourCc};

    fn full_box(fourcc: FourCc, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0, 0, 0, 0];
        body.extend_from_slice(payload);
        encode_box(fourcc, &body)
    }

    /// Body of a `moof` naming `track_id`
    pub fn moof_body(track_id: u32) -> Vec<u8> {
        let mfhd = full_box(FourCc::MFHD, &1u32.to_be_bytes());
        let traf = encode_box(FourCc::TRAF, &full_box(FourCc::TFHD, &track_id.to_be_bytes()));
        [mfhd, traf].concat()
    }

    /// Body of an `egwc` carrying `ms` as microseconds
    pub fn egwc_body(ms: u64) -> Vec<u8> {
        let mut body = vec![0, 0, 0, 0];
        body.extend_from_slice(&(ms * 1000).to_be_bytes());
        body
    }

    pub fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out).lines().map(str::to_string).collect()
    }
}
