//! Text-line formatting for the metrics sink
//!
//! One line per value: `<path>[.<suffix>] <value> <epoch-seconds>\n`.

use std::io::{self, Write};

use crate::stats::PerKind;

pub fn epoch_secs(now_ms: u64) -> u64 {
    now_ms / 1000
}

/// `<path> <value> <epoch>`
pub fn write_value(out: &mut dyn Write, path: &str, value: u64, now_ms: u64) -> io::Result<()> {
    writeln!(out, "{path} {value} {}", epoch_secs(now_ms))
}

/// `<path>.audio<suffix> <u64> <epoch>` then the video line
pub fn write_kind_counts(
    out: &mut dyn Write,
    path: &str,
    suffix: &str,
    values: PerKind<u64>,
    now_ms: u64,
) -> io::Result<()> {
    let secs = epoch_secs(now_ms);
    writeln!(out, "{path}.audio{suffix} {} {secs}", values.audio)?;
    writeln!(out, "{path}.video{suffix} {} {secs}", values.video)
}

/// `<path>.audio <f 2dp> <epoch>` then the video line
pub fn write_kind_rates(
    out: &mut dyn Write,
    path: &str,
    rates: PerKind<f64>,
    now_ms: u64,
) -> io::Result<()> {
    let secs = epoch_secs(now_ms);
    writeln!(out, "{path}.audio {:.2} {secs}", rates.audio)?;
    writeln!(out, "{path}.video {:.2} {secs}", rates.video)
}
