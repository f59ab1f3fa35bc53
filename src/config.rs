//! Per-metric configuration: `<path>,<interval-ms>` looked up by metric name


use thiserror::Error;

use crate::constants::MAX_PATH_LEN;

/// Resolved output path and emission interval of one enabled metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSettings {
    pub path: String,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("not configured")]
    Unset,
    #[error("missing ',' between path and interval")]
    MissingSeparator,
    #[error("empty path")]
    EmptyPath,
    #[error("path longer than {} bytes", MAX_PATH_LEN)]
    PathTooLong,
    #[error("interval '{0}' is not a positive integer of milliseconds")]
    BadInterval(String),
}

/// Source of raw configuration values, keyed by metric name
pub trait ConfigLookup {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads configuration from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl ConfigLookup for EnvLookup {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigLookup for [(&str, &str)] {
    fn lookup(&self, key: &str) -> Option<String> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_string())
    }
}

impl<const N: usize> ConfigLookup for [(&str, &str); N] {
    fn lookup(&self, key: &str) -> Option<String> {
        self.as_slice().lookup(key)
    }
}

impl MetricSettings {
    /// Parses `<path>,<interval-ms>`. The path is everything before the first
    /// comma; the remainder must be a plain unsigned integer.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let (path, interval) = value.split_once(',').ok_or(ConfigError::MissingSeparator)?;
        if path.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        if path.len() > MAX_PATH_LEN {
            return Err(ConfigError::PathTooLong);
        }

        let bad = || ConfigError::BadInterval(interval.to_string());
        let interval_ms: u64 = interval.trim().parse().map_err(|_| bad())?;
        if interval_ms == 0 || interval_ms == u64::MAX {
            return Err(bad());
        }

        Ok(Self { path: path.to_string(), interval_ms })
    }

    pub fn resolve(lookup: &(impl ConfigLookup + ?Sized), name: &str) -> Result<Self, ConfigError> {
        let value = lookup.lookup(name).ok_or(ConfigError::Unset)?;
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_values_yield_path_and_interval() {
        for (raw, path, ms) in [
            ("test.fps,1000", "test.fps", 1000),
            ("a,1", "a", 1),
            ("stats.live.q2q, 250 ", "stats.live.q2q", 250),
        ] {
            let s = MetricSettings::parse(raw).unwrap();
            assert_eq!(s.path, path);
            assert_eq!(s.interval_ms, ms);
        }
    }

    #[test]
    fn malformed_values_disable_the_metric() {
        assert_eq!(MetricSettings::parse("test.fps"), Err(ConfigError::MissingSeparator));
        assert_eq!(MetricSettings::parse(",1000"), Err(ConfigError::EmptyPath));
        for raw in ["p,0", "p,", "p,abc", "p,-5", "p,10,20", "p,18446744073709551615", "p,99999999999999999999"] {
            assert!(
                matches!(MetricSettings::parse(raw), Err(ConfigError::BadInterval(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn path_length_is_bounded() {
        let longest = format!("{},10", "x".repeat(MAX_PATH_LEN));
        assert_eq!(MetricSettings::parse(&longest).unwrap().path.len(), MAX_PATH_LEN);

        let too_long = format!("{},10", "x".repeat(MAX_PATH_LEN + 1));
        assert_eq!(MetricSettings::parse(&too_long), Err(ConfigError::PathTooLong));
    }

    #[test]
    fn resolve_reads_from_lookup() {
        let cfg = [("FRAMES_PER_SECOND", "live.fps,500")];
        let s = MetricSettings::resolve(&cfg, "FRAMES_PER_SECOND").unwrap();
        assert_eq!(s, MetricSettings { path: "live.fps".into(), interval_ms: 500 });
        assert_eq!(MetricSettings::resolve(&cfg, "MEDIA_STREAM_BITRATE"), Err(ConfigError::Unset));
    }
}
