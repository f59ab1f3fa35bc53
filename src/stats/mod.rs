//! Windowed accumulation shared by the metric modules

use crate::types::MediaKind;

/// Tracks the emission boundary of one metric.
///
/// The window opens at the first observed unit. With warm-up enabled nothing
/// is due until a full interval has passed since that first unit.
#[derive(Debug, Clone, Default)]
pub struct IntervalWindow {
    first_ms: Option<u64>,
    window_start_ms: u64,
}

impl IntervalWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the window on the first call; later calls are no-ops.
    pub fn observe(&mut self, now_ms: u64) {
        if self.first_ms.is_none() {
            self.first_ms = Some(now_ms);
            self.window_start_ms = now_ms;
        }
    }

    pub fn is_open(&self) -> bool {
        self.first_ms.is_some()
    }

    /// True during the first interval after the first observation.
    pub fn in_warmup(&self, now_ms: u64, interval_ms: u64) -> bool {
        match self.first_ms {
            Some(first) => now_ms.saturating_sub(first) < interval_ms,
            None => true,
        }
    }

    /// Returns the elapsed window length and restarts the window at `now_ms`
    /// once at least `interval_ms` has passed.
    pub fn close_if_due(&mut self, now_ms: u64, interval_ms: u64) -> Option<u64> {
        self.first_ms?;
        let elapsed = now_ms.saturating_sub(self.window_start_ms);
        if elapsed == 0 || elapsed < interval_ms {
            return None;
        }
        self.window_start_ms = now_ms;
        Some(elapsed)
    }

    /// observe + warm-up gate + close_if_due
    pub fn poll(&mut self, now_ms: u64, interval_ms: u64) -> Option<u64> {
        self.observe(now_ms);
        if self.in_warmup(now_ms, interval_ms) {
            return None;
        }
        self.close_if_due(now_ms, interval_ms)
    }
}

/// A value per media kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerKind<T> {
    pub audio: T,
    pub video: T,
}

impl<T> PerKind<T> {
    pub fn get(&self, kind: MediaKind) -> &T {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }

    pub fn get_mut(&mut self, kind: MediaKind) -> &mut T {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }
}

impl<T: Default> PerKind<T> {
    /// Returns the current values and zeroes them
    pub fn take(&mut self) -> PerKind<T> {
        std::mem::take(self)
    }
}

/// `count` events over `elapsed_ms`, per second
pub fn per_second(count: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    count as f64 * 1000.0 / elapsed_ms as f64
}
