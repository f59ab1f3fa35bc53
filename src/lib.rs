// src/lib.rs
pub mod daemon {
    use tokio_util::sync::CancellationToken;

    use crate::clock::{Clock, SystemClock};
    use crate::metrics::Registry;

    pub use crate::types::{Options, TrackMap};

    /// Async entry-point; returns once `cancel` fires (Ctrl-C) or the source
    /// url is unusable
    pub async fn run(opts: Options, registry: Registry, cancel: CancellationToken) -> anyhow::Result<()> {
        crate::core::run(&opts, registry, SystemClock, &cancel).await
    }

    /// [`run`] with the metric clock supplied by the caller
    pub async fn run_with_clock<C: Clock>(
        opts: Options,
        registry: Registry,
        clock: C,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        crate::core::run(&opts, registry, clock, &cancel).await
    }
}

pub mod clock;
pub mod config;
pub mod constants;
pub mod metrics;
pub mod network;
pub mod parsers;
pub mod processor;
pub mod report;
pub mod session;
pub mod stats;
pub mod transport;
pub mod types;

mod core;
