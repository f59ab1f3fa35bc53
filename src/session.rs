//! Per-attempt session bookkeeping: liveness, end reasons, summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::network::SinkError;
use crate::processor::DispatchError;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Receiving,
    Disconnected,
    Terminated,
}

/// Why a session attempt ended
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sink unavailable")]
    Sink(#[from] SinkError),
    #[error("source failed")]
    Transport(#[from] TransportError),
    #[error("no unit received for {idle_ms} ms")]
    Timeout { idle_ms: u64 },
    #[error("end of stream")]
    EndOfStream,
    #[error("dispatch failed")]
    Dispatch(#[from] DispatchError),
}

impl SessionError {
    /// Short reason recorded in the session summary
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::Sink(_) => "sink",
            SessionError::Transport(_) => "transport",
            SessionError::Timeout { .. } => "timeout",
            SessionError::EndOfStream => "end_of_stream",
            SessionError::Dispatch(_) => "dispatch",
        }
    }
}

/// Liveness of one session attempt
#[derive(Debug, Clone)]
pub struct SessionState {
    started_at: DateTime<Utc>,
    started_ms: u64,
    last_delivery_ms: u64,
    timeout_ms: u64,
    units: u64,
    bytes: u64,
}

impl SessionState {
    /// `now_ms` and later readings come from the liveness clock; `started_at`
    /// is only reported.
    pub fn start(started_at: DateTime<Utc>, now_ms: u64, timeout_ms: u64) -> Self {
        Self {
            started_at,
            started_ms: now_ms,
            last_delivery_ms: now_ms,
            timeout_ms,
            units: 0,
            bytes: 0,
        }
    }

    pub fn record_delivery(&mut self, now_ms: u64, declared_len: u64) {
        self.last_delivery_ms = now_ms;
        self.units += 1;
        self.bytes += declared_len;
    }

    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_delivery_ms)
    }

    pub fn is_timed_out(&self, now_ms: u64) -> bool {
        self.idle_ms(now_ms) > self.timeout_ms
    }

    /// Time left before the session times out, zero once it has
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        (self.timeout_ms + 1).saturating_sub(self.idle_ms(now_ms))
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn summary(&self, now_ms: u64, end: &SessionError) -> SessionSummary {
        SessionSummary {
            started_at: self.started_at.to_rfc3339(),
            duration_ms: now_ms.saturating_sub(self.started_ms),
            units: self.units,
            bytes: self.bytes,
            end_reason: end.reason(),
            detail: end.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub started_at: String,
    pub duration_ms: u64,
    pub units: u64,
    pub bytes: u64,
    pub end_reason: &'static str,
    pub detail: String,
}
