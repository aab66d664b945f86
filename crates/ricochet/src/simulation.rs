//! # Simulation
//!
//! Owns the State Store and the pipeline, and runs the two loops:
//!
//! ```text
//!   Simulation::run(sink, stop)
//!     ├─ thread "ricochet-compute": ComputeLoop::run
//!     └─ calling thread:            DisplayLoop::run(sink)
//!   both joined ──> RunSummary
//! ```
//!
//! Each run gets a fresh handoff, so a simulation can be run again after it
//! stopped; bodies continue from the last published generation.

use std::sync::Arc;
use std::thread;

use ricochet_core::{ArenaBounds, ArenaParams, ArenaSize, Body, StateStore, StatsAggregate};

use crate::backend::BackendSet;
use crate::config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::handoff::Handoff;
use crate::loops::{ComputeLoop, DisplayLoop, RenderSink, StopPredicate, TimeStep};
use crate::pipeline::PhysicsPipeline;
use crate::spawn;

/// Outcome of one [`Simulation::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Cycles computed and published.
    pub cycles: u64,
    /// Frames presented.
    pub frames: u64,
    /// Frames presented from a generation that had lost the read role.
    pub stale_frames: u64,
    /// Cycle index of the last presented frame.
    pub last_cycle: u64,
    /// Statistics of the last published cycle.
    pub last_stats: StatsAggregate,
}

/// A configured, ready-to-run simulation.
#[derive(Debug)]
pub struct Simulation {
    store: StateStore,
    pipeline: PhysicsPipeline,
    time_step: TimeStep,
}

impl Simulation {
    /// Builds a simulation from a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`SimError::Config`] for out-of-range values.
    /// - [`SimError::Initialization`] if the backend pool cannot start.
    pub fn new(config: &SimulationConfig) -> SimResult<Self> {
        config.validate()?;

        let size = config.arena.size();
        let bodies = spawn::populate(&config.population, size);
        let backends = BackendSet::from_config(&config.backend)?;

        tracing::info!(
            bodies = bodies.len(),
            width = size.width,
            height = size.height,
            backend = backends.bulk.name(),
            "simulation initialized"
        );

        Self::with_parts(
            bodies,
            config.arena.params(),
            ArenaBounds::new(size, config.min_extent())?,
            backends,
            config.time_step,
        )
    }

    /// Builds a simulation from explicit parts.
    ///
    /// # Errors
    ///
    /// [`SimError::Store`] if `bodies` is empty or holds an invalid radius.
    pub fn with_parts(
        bodies: Vec<Body>,
        params: ArenaParams,
        bounds: ArenaBounds,
        backends: BackendSet,
        time_step: TimeStep,
    ) -> SimResult<Self> {
        let store = StateStore::new(bodies)?;
        let pipeline = PhysicsPipeline::new(params, Arc::new(bounds), backends);
        Ok(Self {
            store,
            pipeline,
            time_step,
        })
    }

    /// The State Store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// The pipeline.
    #[inline]
    #[must_use]
    pub const fn pipeline(&self) -> &PhysicsPipeline {
        &self.pipeline
    }

    /// Handle for resizing the arena from any thread.
    #[must_use]
    pub fn bounds(&self) -> Arc<ArenaBounds> {
        Arc::clone(self.pipeline.bounds())
    }

    /// Resizes the arena; takes effect at the next cycle.
    ///
    /// # Errors
    ///
    /// [`SimError::Store`] if the size is not finite or cannot hold the
    /// largest body. The previous size is kept.
    pub fn resize(&self, width: f32, height: f32) -> SimResult<ArenaSize> {
        if let Err(err) = self.pipeline.bounds().resize(width, height) {
            tracing::warn!(width, height, error = %err, "arena resize rejected");
            return Err(err.into());
        }
        tracing::info!(width, height, "arena resized");
        Ok(self.pipeline.bounds().size())
    }

    /// Runs compute on a new thread and display on the calling thread until
    /// `stop` holds or a cycle fails.
    ///
    /// Both loops have exited when this returns.
    ///
    /// # Errors
    ///
    /// - [`SimError::Initialization`] if the compute thread cannot spawn.
    /// - [`SimError::StageExecution`] / [`SimError::Store`] from a failed
    ///   cycle.
    /// - [`SimError::ComputeThreadPanicked`] if the compute thread panicked.
    pub fn run<S: RenderSink>(
        &self,
        sink: &mut S,
        stop: &dyn StopPredicate,
    ) -> SimResult<RunSummary> {
        let handoff = Handoff::new();

        let (compute, display) = thread::scope(|scope| {
            let compute = ComputeLoop::new(&self.store, &self.pipeline, &handoff, self.time_step);
            let worker = thread::Builder::new()
                .name("ricochet-compute".into())
                .spawn_scoped(scope, move || compute.run(stop))
                .map_err(|e| SimError::Initialization(format!("compute thread: {e}")))?;

            let display = DisplayLoop::new(&self.store, &handoff, sink).run(stop);

            let compute = worker.join().map_err(|_| SimError::ComputeThreadPanicked)?;
            Ok::<_, SimError>((compute, display))
        })?;
        let compute = compute?;

        Ok(RunSummary {
            cycles: compute.cycles,
            frames: display.frames,
            stale_frames: display.stale_frames,
            last_cycle: display.last_cycle,
            last_stats: compute.last_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::Generation;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.population.count = 16;
        config.backend.bulk = crate::config::BulkBackendKind::Serial;
        config
    }

    #[test]
    fn test_run_stops_after_n_frames() {
        let sim = Simulation::new(&small_config()).unwrap();
        let frames = AtomicU64::new(0);
        let mut sink = |_: &Generation| {
            frames.fetch_add(1, Ordering::SeqCst);
        };
        let stop = || frames.load(Ordering::SeqCst) >= 10;

        let summary = sim.run(&mut sink, &stop).unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(summary.cycles, 10);
        assert_eq!(summary.last_cycle, 10);
        assert_eq!(summary.stale_frames, 0);
        assert_eq!(sim.store().swap_count(), 10);
    }

    #[test]
    fn test_second_run_continues() {
        let sim = Simulation::new(&small_config()).unwrap();
        let frames = AtomicU64::new(0);
        let mut sink = |_: &Generation| {
            frames.fetch_add(1, Ordering::SeqCst);
        };

        let stop = || frames.load(Ordering::SeqCst) >= 3;
        sim.run(&mut sink, &stop).unwrap();
        let stop = || frames.load(Ordering::SeqCst) >= 6;
        let summary = sim.run(&mut sink, &stop).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.last_cycle, 6);
    }

    #[test]
    fn test_resize_validation() {
        let sim = Simulation::new(&small_config()).unwrap();
        assert!(sim.resize(10.0, 10.0).is_err());
        let size = sim.resize(400.0, 300.0).unwrap();
        assert!((size.width - 400.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small_config();
        config.population.count = 0;
        assert!(matches!(Simulation::new(&config), Err(SimError::Config(_))));
    }
}
