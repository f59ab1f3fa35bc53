use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::metrics::Registry;
use crate::network::Sink;
use crate::processor::UnitProcessor;
use crate::session::{SessionError, SessionPhase, SessionState};
use crate::transport::{open_source, SourceUrl, UnitReader};
use crate::types::Options;

/// Connect, receive, back off, repeat, until `cancel` fires.
pub async fn run<C: Clock>(
    opts: &Options,
    registry: Registry,
    clock: C,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let source: SourceUrl = opts.source_url.parse()?;
    if registry.is_empty() {
        warn!("no metric is configured; units will be received and discarded");
    }
    let mut processor = UnitProcessor::new(registry, clock);
    let liveness = MonotonicClock::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let mut state = SessionState::start(Utc::now(), liveness.now_ms(), opts.stream_timeout.as_millis() as u64);
        debug!(phase = ?SessionPhase::Connecting, source = %source, sink = %opts.sink_addr);

        match run_session(opts, &source, &mut processor, &mut state, &liveness, cancel).await {
            Ok(()) => break,
            Err(e) => {
                let summary = state.summary(liveness.now_ms(), &e);
                warn!(phase = ?SessionPhase::Disconnected, "session ended: {}", error_chain(&e));
                info!(summary = %serde_json::to_string(&summary).unwrap_or_default(), "session summary");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(opts.reconnect_interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    info!(phase = ?SessionPhase::Terminated, "stopped");
    Ok(())
}

/// One attempt: sink first, then source, then receive until something ends it.
/// `Ok` means a stop was requested.
async fn run_session<C: Clock>(
    opts: &Options,
    source: &SourceUrl,
    processor: &mut UnitProcessor<C>,
    state: &mut SessionState,
    liveness: &MonotonicClock,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    // blocking connect bounded by the sink timeout; nothing else runs meanwhile
    let mut sink = Sink::connect(&opts.sink_addr, opts.sink_timeout)?;
    let mut reader = open_source(source).await?;
    debug!(phase = ?SessionPhase::Receiving, format = %reader.format());

    receive(&mut reader, processor, &mut sink, state, liveness, cancel).await
}

/// Reads and dispatches units until stop, staleness, end of stream or error
pub(crate) async fn receive<R, C>(
    reader: &mut UnitReader<R>,
    processor: &mut UnitProcessor<C>,
    sink: &mut dyn Write,
    state: &mut SessionState,
    liveness: &impl Clock,
    cancel: &CancellationToken,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    C: Clock,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let now = liveness.now_ms();
        if state.is_timed_out(now) {
            return Err(SessionError::Timeout { idle_ms: state.idle_ms(now) });
        }

        let remaining = Duration::from_millis(state.remaining_ms(now));
        let unit = match tokio::time::timeout(remaining, reader.next_unit()).await {
            Ok(unit) => unit?.ok_or(SessionError::EndOfStream)?,
            Err(_) => return Err(SessionError::Timeout { idle_ms: state.idle_ms(liveness.now_ms()) }),
        };

        processor.process_unit(&unit, sink)?;
        state.record_delivery(liveness.now_ms(), unit.declared_len);
    }
}

/// `outer: inner: root` rendering of an error and its sources
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
