//! media-metricsd - live FLV / fragmented-MP4 stream metrics daemon.
//!
//! Reads units from a source, computes the metrics enabled through the
//! environment and writes `<path> <value> <epoch>` lines to a sink.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use media_metrics::config::EnvLookup;
use media_metrics::constants::{PASSTHROUGH_SINK, RECONNECT_INTERVAL_MS, SINK_TIMEOUT_SECS, STREAM_TIMEOUT_MS};
use media_metrics::daemon::{run, Options, TrackMap};
use media_metrics::metrics::{supported, Registry, CATALOG};

/// Live stream metrics daemon.
#[derive(Parser)]
#[command(name = "media-metricsd", version)]
struct Args {
    /// flv://host:port, fmp4://host:port, file:///path.flv or file:///path.mp4
    source: String,

    /// host:port of the metrics collector, or '-' for stdout
    sink: String,

    /// Reconnect when no unit arrives for this long
    #[arg(long, env = "STREAM_TIMEOUT_MS", default_value_t = STREAM_TIMEOUT_MS)]
    stream_timeout_ms: u64,

    /// Delay between connection attempts
    #[arg(long, env = "RECONNECT_INTERVAL_MS", default_value_t = RECONNECT_INTERVAL_MS)]
    reconnect_interval_ms: u64,

    /// Connect, send and receive timeout of the sink socket
    #[arg(long, env = "SINK_TIMEOUT_SECS", default_value_t = SINK_TIMEOUT_SECS)]
    sink_timeout_secs: u64,

    /// Fragment track id carrying video
    #[arg(long, default_value_t = TrackMap::default().video)]
    video_track: u32,

    /// Fragment track id carrying audio
    #[arg(long, default_value_t = TrackMap::default().audio)]
    audio_track: u32,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn usage_footer() -> String {
    let mut text = format!(
        "Built-in settings:\n  \
         stream timeout     {STREAM_TIMEOUT_MS} ms\n  \
         reconnect interval {RECONNECT_INTERVAL_MS} ms\n  \
         sink timeout       {SINK_TIMEOUT_SECS} s\n  \
         sink '{PASSTHROUGH_SINK}' writes to stdout\n\n\
         Supported metrics (enable with <NAME>=<path>,<interval-ms>):\n"
    );
    for metric in supported() {
        text.push_str(&format!("  {:<34}{}\n", metric.name, metric.summary));
    }
    text
}

fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("media_metrics={level}").parse()?)
        .add_directive(format!("media_metricsd={level}").parse()?);

    // stdout may be the metric sink
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot initialise logging: {e}"))
}

/// Parses the command line. Argument errors print the error followed by the
/// full usage text, including built-in settings and supported metrics.
fn parse_args() -> Result<Args, ExitCode> {
    let mut cmd = Args::command().after_help(usage_footer());
    let parsed = cmd
        .try_get_matches_from_mut(std::env::args_os())
        .and_then(|matches: ArgMatches| Args::from_arg_matches(&matches));
    match parsed {
        Ok(args) => Ok(args),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            eprintln!();
            let _ = cmd.write_long_help(&mut io::stderr());
            Err(ExitCode::from(2))
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(code) => return Ok(code),
    };

    init_logging(args.verbose, args.quiet)?;
    info!("media-metricsd {} starting", env!("CARGO_PKG_VERSION"));

    let tracks = TrackMap { video: args.video_track, audio: args.audio_track };
    let registry = Registry::build(CATALOG, &EnvLookup, &tracks);
    info!(enabled = registry.len(), metrics = ?registry.names().collect::<Vec<_>>(), "registry built");

    let mut opts = Options::new(args.source, args.sink);
    opts.stream_timeout = Duration::from_millis(args.stream_timeout_ms);
    opts.reconnect_interval = Duration::from_millis(args.reconnect_interval_ms);
    opts.sink_timeout = Duration::from_secs(args.sink_timeout_secs);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("stop requested");
                stopper.cancel();
            }
        });
        run(opts, registry, cancel).await
    })?;
    Ok(ExitCode::SUCCESS)
}
