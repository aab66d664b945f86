//! # Execution Backends
//!
//! A backend runs one named stage over every body and blocks until all work
//! items have finished. The caller never observes a partially executed
//! stage: either the call returns `Ok` and every item ran, or it returns an
//! error and the cycle is abandoned.
//!
//! ```text
//!   PhysicsPipeline
//!        │
//!        ├── validating ──> SerialBackend   (Prepare, Statistics)
//!        │                   checks every body is finite afterwards
//!        │
//!        └── bulk ────────> ParallelBackend (Integrate)
//!                            rayon pool, one item per body
//! ```
//!
//! Backends are plain values handed to the pipeline at construction. Both
//! handles may point at the same instance.
//!
//! ## Known limitation
//!
//! There are no timeouts. A backend that never returns blocks the compute
//! loop, which in turn leaves the display loop waiting for its next turn.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use ricochet_core::{Body, StatsAggregate};

use crate::config::{BackendConfig, BulkBackendKind};
use crate::error::{BackendError, BackendResult};

/// The three pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Copy from the read generation and clamp into bounds.
    Prepare,
    /// Gravity, walls, velocity ceiling, then pairwise collisions.
    Integrate,
    /// Speed/energy reduction.
    Statistics,
}

impl StageId {
    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Integrate => "integrate",
            Self::Statistics => "statistics",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-body kernel. Items are independent; may run in any order.
pub type BodyKernel<'k> = dyn Fn(usize, &mut Body) + Sync + 'k;

/// Per-body sampling kernel for reductions.
pub type SampleKernel<'k> = dyn Fn(usize, &Body) -> StatsAggregate + Sync + 'k;

/// Whole-generation kernel, executed as a single work item.
pub type SweepKernel<'k> = dyn FnMut(&mut [Body]) + 'k;

/// A synchronous dispatcher for pipeline stages.
pub trait ExecutionBackend: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Runs `kernel` once per body and waits for all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the dispatch or, for
    /// validating backends, if the stage left a body non-finite.
    fn run_stage(
        &self,
        stage: StageId,
        bodies: &mut [Body],
        kernel: &BodyKernel<'_>,
    ) -> BackendResult<()>;

    /// Samples every body and combines the samples with
    /// [`StatsAggregate::combine`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the dispatch. Validating
    /// backends also fail on a non-finite body or a non-finite aggregate.
    fn run_reduction(
        &self,
        stage: StageId,
        bodies: &[Body],
        kernel: &SampleKernel<'_>,
    ) -> BackendResult<StatsAggregate>;

    /// Runs `kernel` over the whole generation as one work item.
    ///
    /// Used for work with a fixed cross-body order (pairwise collisions).
    /// The call starts only after any previous dispatch has returned, which
    /// makes it a global barrier.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the dispatch.
    fn run_sweep(
        &self,
        stage: StageId,
        bodies: &mut [Body],
        kernel: &mut SweepKernel<'_>,
    ) -> BackendResult<()> {
        let _ = stage;
        kernel(bodies);
        Ok(())
    }
}

fn check_bodies(stage: StageId, bodies: &[Body]) -> BackendResult<()> {
    match bodies.iter().position(|b| !b.is_finite()) {
        Some(index) => Err(BackendError::NonFiniteState { stage, index }),
        None => Ok(()),
    }
}

/// Runs every item on the calling thread, in index order.
///
/// The validating flavor checks the generation after every dispatch and
/// fails the stage on the first NaN or infinite body.
#[derive(Clone, Copy, Debug)]
pub struct SerialBackend {
    validate: bool,
}

impl SerialBackend {
    /// Serial backend that validates every stage's output.
    #[must_use]
    pub const fn validating() -> Self {
        Self { validate: true }
    }

    /// Serial backend without output checks.
    #[must_use]
    pub const fn unchecked() -> Self {
        Self { validate: false }
    }
}

impl ExecutionBackend for SerialBackend {
    fn name(&self) -> &str {
        if self.validate {
            "serial-validating"
        } else {
            "serial"
        }
    }

    fn run_stage(
        &self,
        stage: StageId,
        bodies: &mut [Body],
        kernel: &BodyKernel<'_>,
    ) -> BackendResult<()> {
        for (index, body) in bodies.iter_mut().enumerate() {
            kernel(index, body);
        }
        if self.validate {
            check_bodies(stage, bodies)?;
        }
        Ok(())
    }

    fn run_reduction(
        &self,
        stage: StageId,
        bodies: &[Body],
        kernel: &SampleKernel<'_>,
    ) -> BackendResult<StatsAggregate> {
        if self.validate {
            check_bodies(stage, bodies)?;
        }
        let total: StatsAggregate = bodies
            .iter()
            .enumerate()
            .map(|(index, body)| kernel(index, body))
            .sum();
        if self.validate && !total.is_finite() {
            return Err(BackendError::NonFiniteAggregate { stage });
        }
        Ok(total)
    }

    fn run_sweep(
        &self,
        stage: StageId,
        bodies: &mut [Body],
        kernel: &mut SweepKernel<'_>,
    ) -> BackendResult<()> {
        kernel(bodies);
        if self.validate {
            check_bodies(stage, bodies)?;
        }
        Ok(())
    }
}

/// Data-parallel backend on a dedicated rayon pool.
pub struct ParallelBackend {
    pool: ThreadPool,
}

impl ParallelBackend {
    /// Builds a pool with `threads` workers (0 = one per logical CPU).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::PoolBuild`] if the worker threads cannot be
    /// spawned.
    pub fn new(threads: usize) -> BackendResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ricochet-bulk-{i}"))
            .build()
            .map_err(|e| BackendError::PoolBuild(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for ParallelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelBackend")
            .field("threads", &self.threads())
            .finish()
    }
}

impl ExecutionBackend for ParallelBackend {
    fn name(&self) -> &str {
        "parallel"
    }

    fn run_stage(
        &self,
        _stage: StageId,
        bodies: &mut [Body],
        kernel: &BodyKernel<'_>,
    ) -> BackendResult<()> {
        self.pool.install(|| {
            bodies
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, body)| kernel(index, body));
        });
        Ok(())
    }

    fn run_reduction(
        &self,
        _stage: StageId,
        bodies: &[Body],
        kernel: &SampleKernel<'_>,
    ) -> BackendResult<StatsAggregate> {
        Ok(self.pool.install(|| {
            bodies
                .par_iter()
                .enumerate()
                .map(|(index, body)| kernel(index, body))
                .reduce(|| StatsAggregate::IDENTITY, StatsAggregate::combine)
        }))
    }
}

/// The two backend handles the pipeline is built with.
#[derive(Clone)]
pub struct BackendSet {
    /// Runs Prepare and Statistics.
    pub validating: Arc<dyn ExecutionBackend>,
    /// Runs Integrate.
    pub bulk: Arc<dyn ExecutionBackend>,
}

impl BackendSet {
    /// Pairs two explicit backends.
    #[must_use]
    pub fn new(validating: Arc<dyn ExecutionBackend>, bulk: Arc<dyn ExecutionBackend>) -> Self {
        Self { validating, bulk }
    }

    /// One validating serial backend behind both handles.
    #[must_use]
    pub fn serial() -> Self {
        let shared: Arc<dyn ExecutionBackend> = Arc::new(SerialBackend::validating());
        Self {
            validating: Arc::clone(&shared),
            bulk: shared,
        }
    }

    /// Builds the backends a configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::PoolBuild`] if a parallel pool cannot start.
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let validating: Arc<dyn ExecutionBackend> = Arc::new(SerialBackend::validating());
        let bulk: Arc<dyn ExecutionBackend> = match config.bulk {
            BulkBackendKind::Parallel => Arc::new(ParallelBackend::new(config.threads)?),
            BulkBackendKind::Serial => Arc::new(SerialBackend::unchecked()),
        };
        Ok(Self { validating, bulk })
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSet")
            .field("validating", &self.validating.name())
            .field("bulk", &self.bulk.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bodies(n: usize) -> Vec<Body> {
        (0..n)
            .map(|i| Body::new(i as f32, 1.0, 1.0, [0; 4]).with_velocity(i as f32 * 0.5, -1.0))
            .collect()
    }

    #[test]
    fn test_serial_runs_every_item() {
        let mut b = bodies(16);
        SerialBackend::validating()
            .run_stage(StageId::Prepare, &mut b, &|i, body| body.x = i as f32 * 2.0)
            .unwrap();
        assert!(b.iter().enumerate().all(|(i, body)| (body.x - i as f32 * 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_validating_rejects_nan() {
        let mut b = bodies(4);
        let err = SerialBackend::validating()
            .run_stage(StageId::Integrate, &mut b, &|i, body| {
                if i == 2 {
                    body.vy = f32::NAN;
                }
            })
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::NonFiniteState {
                stage: StageId::Integrate,
                index: 2
            }
        );
    }

    #[test]
    fn test_validating_reduction_rejects_unsampled_nan() {
        let mut b = bodies(4);
        b[3].x = f32::NAN;
        // Position x never reaches the aggregate.
        let kernel =
            |_: usize, body: &Body| StatsAggregate::from_sample(f64::from(body.speed()), 0.0);

        assert!(SerialBackend::unchecked()
            .run_reduction(StageId::Statistics, &b, &kernel)
            .is_ok());
        assert_eq!(
            SerialBackend::validating()
                .run_reduction(StageId::Statistics, &b, &kernel)
                .unwrap_err(),
            BackendError::NonFiniteState {
                stage: StageId::Statistics,
                index: 3
            }
        );
    }

    #[test]
    fn test_unchecked_accepts_nan() {
        let mut b = bodies(2);
        assert!(SerialBackend::unchecked()
            .run_stage(StageId::Integrate, &mut b, &|_, body| body.x = f32::NAN)
            .is_ok());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let kernel = |i: usize, body: &mut Body| {
            body.x += body.vx * 0.5 + i as f32;
            body.vy *= 2.0;
        };
        let mut serial = bodies(1_000);
        let mut parallel = serial.clone();

        SerialBackend::validating()
            .run_stage(StageId::Integrate, &mut serial, &kernel)
            .unwrap();
        ParallelBackend::new(4)
            .unwrap()
            .run_stage(StageId::Integrate, &mut parallel, &kernel)
            .unwrap();

        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_parallel_reduction_matches_serial() {
        let b = bodies(10_000);
        let kernel = |_: usize, body: &Body| {
            StatsAggregate::from_sample(f64::from(body.speed()), f64::from(body.x))
        };

        let serial = SerialBackend::validating()
            .run_reduction(StageId::Statistics, &b, &kernel)
            .unwrap();
        let parallel = ParallelBackend::new(4)
            .unwrap()
            .run_reduction(StageId::Statistics, &b, &kernel)
            .unwrap();

        assert_eq!(serial.count, 10_000);
        assert!(serial.approx_eq(&parallel, 1e-4));
    }

    #[test]
    fn test_shared_serial_set() {
        let set = BackendSet::serial();
        assert!(Arc::ptr_eq(&set.validating, &set.bulk));
        assert_eq!(set.bulk.name(), "serial-validating");
    }
}
