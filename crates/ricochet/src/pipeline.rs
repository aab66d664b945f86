//! # Physics Pipeline
//!
//! One compute cycle, three stages, each a blocking backend dispatch:
//!
//! ```text
//!   read generation (cycle N)           write generation (becomes N+1)
//!   ┌────────────────────┐              ┌────────────────────────────┐
//!   │ settled bodies     │── Prepare ──>│ copy + clamp to arena       │  validating
//!   └────────────────────┘              │                             │
//!                                       │ Integrate                   │
//!                                       │  ├─ per body: g, x+=v·dt,   │  bulk
//!                                       │  │  walls, speed ceiling    │
//!                                       │  └─ pairwise sweep i<j      │  bulk, 1 item
//!                                       │                             │
//!                                       │ Statistics ─> StatsAggregate│  validating
//!                                       └────────────────────────────┘
//! ```
//!
//! The pipeline never swaps. The compute loop swaps only after
//! [`PhysicsPipeline::run_cycle`] returned `Ok`, i.e. after all three
//! dispatches completed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ricochet_core::{
    ArenaBounds, ArenaParams, ArenaSize, Body, CycleMeta, Generation, StateStore, StatsAggregate,
    StoreError,
};

use crate::backend::{BackendSet, StageId};
use crate::error::{SimError, SimResult};
use crate::physics::{self, SweepCounts};

/// Cycles slower than this are logged at `warn`.
pub const SLOW_CYCLE: Duration = Duration::from_millis(33);

/// What one cycle produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    /// Index of the generation just computed.
    pub cycle: u64,
    /// Statistics of that generation.
    pub stats: StatsAggregate,
    /// Pairs resolved in the pairwise phase.
    pub collisions: u32,
    /// Pairs skipped because their centers coincide.
    pub coincident_pairs: u32,
    /// Wall contacts in the per-body phase.
    pub wall_contacts: u32,
    /// Wall-clock duration of the three stages.
    pub elapsed: Duration,
}

/// Prepare → Integrate → Statistics over the State Store.
#[derive(Debug)]
pub struct PhysicsPipeline {
    params: ArenaParams,
    bounds: Arc<ArenaBounds>,
    backends: BackendSet,
}

impl PhysicsPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(params: ArenaParams, bounds: Arc<ArenaBounds>, backends: BackendSet) -> Self {
        Self {
            params,
            bounds,
            backends,
        }
    }

    /// Physical constants.
    #[inline]
    #[must_use]
    pub const fn params(&self) -> &ArenaParams {
        &self.params
    }

    /// Shared arena bounds. Resizes become visible at the next cycle.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> &Arc<ArenaBounds> {
        &self.bounds
    }

    /// Computes the next generation into the write generation.
    ///
    /// The arena size is read once, so a concurrent resize never splits a
    /// cycle.
    ///
    /// # Errors
    ///
    /// - [`SimError::Store`] if a write handle is already outstanding.
    /// - [`SimError::StageExecution`] naming the first stage that failed.
    ///
    /// On error the write generation is partially updated and must not be
    /// published.
    pub fn run_cycle(&self, store: &StateStore, dt: f32) -> SimResult<CycleReport> {
        let started = Instant::now();
        let size = self.bounds.size();

        let source = store.acquire_read();
        let mut target = store.acquire_write()?;
        let cycle = source.meta().cycle + 1;

        self.prepare(&source, &mut target, size)?;
        drop(source);

        let (wall_contacts, sweep) = self.integrate(&mut target, size, dt)?;
        let stats = self.statistics(&target, size)?;

        target.set_meta(CycleMeta {
            cycle,
            stats,
            collisions: sweep.resolved,
            wall_contacts,
        });
        drop(target);

        let report = CycleReport {
            cycle,
            stats,
            collisions: sweep.resolved,
            coincident_pairs: sweep.coincident,
            wall_contacts,
            elapsed: started.elapsed(),
        };

        if report.elapsed > SLOW_CYCLE {
            tracing::warn!(
                cycle,
                elapsed_ms = report.elapsed.as_secs_f64() * 1_000.0,
                bodies = store.population(),
                "slow cycle"
            );
        }
        if sweep.coincident > 0 {
            tracing::trace!(cycle, pairs = sweep.coincident, "coincident pairs skipped");
        }

        Ok(report)
    }

    /// Stage A: copy every settled body from `source` and clamp it.
    ///
    /// # Errors
    ///
    /// Fails if the generations differ in length or the backend rejects the
    /// stage.
    pub fn prepare(
        &self,
        source: &Generation,
        target: &mut Generation,
        size: ArenaSize,
    ) -> SimResult<()> {
        if source.len() != target.len() {
            return Err(SimError::Store(StoreError::PopulationMismatch {
                expected: target.len(),
                actual: source.len(),
            }));
        }

        let settled = source.bodies();
        self.backends.validating.run_stage(
            StageId::Prepare,
            target.bodies_mut(),
            &|i, body: &mut Body| *body = physics::prepare_body(&settled[i], size),
        )?;
        Ok(())
    }

    /// Stage B: per-body motion on the bulk backend, then the pairwise
    /// sweep once every body has moved.
    ///
    /// Returns the wall contact total and the sweep counts.
    ///
    /// # Errors
    ///
    /// Fails if the bulk backend rejects either dispatch.
    pub fn integrate(
        &self,
        target: &mut Generation,
        size: ArenaSize,
        dt: f32,
    ) -> SimResult<(u32, SweepCounts)> {
        let params = self.params;
        let walls = AtomicU32::new(0);

        self.backends.bulk.run_stage(
            StageId::Integrate,
            target.bodies_mut(),
            &|_, body: &mut Body| {
                let contacts = physics::integrate_body(body, &params, size, dt);
                if contacts > 0 {
                    walls.fetch_add(contacts, Ordering::Relaxed);
                }
            },
        )?;

        let mut counts = SweepCounts::default();
        let restitution = params.collision_restitution;
        self.backends.bulk.run_sweep(
            StageId::Integrate,
            target.bodies_mut(),
            &mut |bodies: &mut [Body]| {
                counts = physics::resolve_collisions(bodies, restitution, size);
            },
        )?;

        Ok((walls.into_inner(), counts))
    }

    /// Stage C: reduce the generation into a [`StatsAggregate`].
    ///
    /// # Errors
    ///
    /// Fails if the backend rejects the stage or the aggregate is not
    /// finite.
    pub fn statistics(&self, target: &Generation, size: ArenaSize) -> SimResult<StatsAggregate> {
        let params = self.params;
        let stats = self.backends.validating.run_reduction(
            StageId::Statistics,
            target.bodies(),
            &|_, body: &Body| physics::sample_body(body, &params, size),
        )?;
        Ok(stats)
    }
}
