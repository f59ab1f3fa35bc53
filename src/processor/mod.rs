//! Per-unit dispatch to the enabled metrics

use std::io::Write;

use thiserror::Error;
use tracing::trace;

use crate::clock::Clock;
use crate::metrics::{MetricError, Registry};
use crate::types::MediaUnit;

#[derive(Debug, Error)]
#[error("metric {metric} failed")]
pub struct DispatchError {
    pub metric: &'static str,
    #[source]
    pub source: MetricError,
}

/// Classifies each unit once and hands it to every metric whose capability
/// mask intersects the unit's kinds, in registry order.
pub struct UnitProcessor<C: Clock> {
    registry: Registry,
    clock: C,
}

impl<C: Clock> UnitProcessor<C> {
    pub fn new(registry: Registry, clock: C) -> Self {
        Self { registry, clock }
    }

    /// Process a single unit. The first metric error aborts the dispatch;
    /// metrics after it do not see the unit.
    pub fn process_unit(&mut self, unit: &MediaUnit<'_>, out: &mut dyn Write) -> Result<(), DispatchError> {
        let kinds = unit.kinds();
        let now_ms = self.clock.now_ms();
        trace!(format = %unit.format, unit_type = unit.unit_type, ?kinds, "dispatch");

        for entry in self.registry.entries_mut() {
            if !entry.accepts(kinds) {
                continue;
            }
            entry
                .emit(unit, now_ms, out)
                .map_err(|source| DispatchError { metric: entry.name(), source })?;
        }
        Ok(())
    }
}
