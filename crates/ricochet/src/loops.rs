//! # Compute and Display Loops
//!
//! ```text
//!   Compute thread                          Display thread (caller)
//!   ──────────────                          ──────────────────────
//!   loop {                                  loop {
//!     stop? ─────────────> exit               stop? ─────────────> exit
//!     claim(Compute) ── shutdown ─> exit      claim(Display) ── shutdown ─> exit
//!     stop? ─────────────> exit               stop? ─────────────> exit
//!     run_cycle ─── error ─> exit             acquire_read
//!     swap                                    sink.present(generation)
//!     release(Compute) ───── token ────────>  release(Display)
//!   }                       <──── token ───── }
//!   shutdown()                              shutdown()
//! ```
//!
//! Every exit path broadcasts shutdown, so the peer never waits for a turn
//! that cannot come. A drop guard covers unwinding as well.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use ricochet_core::{Generation, StateStore, StatsAggregate};

use crate::error::{ConfigError, SimResult};
use crate::handoff::{Handoff, ShutdownOnDrop, Side, Turn};
use crate::pipeline::PhysicsPipeline;

/// Upper bound on any single step, matching a 10 fps floor.
pub const MAX_STEP: f32 = 0.1;

// ============================================================================
// TIME STEP
// ============================================================================

/// How `dt` is chosen for each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TimeStep {
    /// Same `dt` every cycle. Runs are reproducible.
    Fixed {
        /// Seconds per cycle.
        dt: f32,
    },
    /// Wall-clock time since the previous cycle, clamped to `max_dt`.
    Measured {
        /// Clamp for long stalls.
        max_dt: f32,
    },
}

impl Default for TimeStep {
    fn default() -> Self {
        Self::Fixed { dt: 1.0 / 60.0 }
    }
}

impl TimeStep {
    /// Checks the step is positive, finite and at most [`MAX_STEP`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range steps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (name, value) = match *self {
            Self::Fixed { dt } => ("time_step.dt", dt),
            Self::Measured { max_dt } => ("time_step.max_dt", max_dt),
        };
        if value > 0.0 && value <= MAX_STEP {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "{name} must be in (0, {MAX_STEP}] (got {value})"
            )))
        }
    }

    /// Starts a clock producing one `dt` per cycle.
    #[must_use]
    pub fn clock(self) -> StepClock {
        StepClock {
            step: self,
            last: Instant::now(),
        }
    }
}

/// Produces the `dt` of successive cycles.
#[derive(Debug)]
pub struct StepClock {
    step: TimeStep,
    last: Instant,
}

impl StepClock {
    /// `dt` for the cycle about to run.
    pub fn next_dt(&mut self) -> f32 {
        match self.step {
            TimeStep::Fixed { dt } => dt,
            TimeStep::Measured { max_dt } => {
                let now = Instant::now();
                let elapsed = now.duration_since(self.last).as_secs_f32();
                self.last = now;
                elapsed.min(max_dt)
            }
        }
    }
}

// ============================================================================
// STOP PREDICATE / RENDER SINK
// ============================================================================

/// Polled by both loops once before and once after each claim.
pub trait StopPredicate: Send + Sync {
    /// True once the run should end.
    fn should_stop(&self) -> bool;
}

impl<F> StopPredicate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Shareable stop switch.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// A flag that is not yet set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to end.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`stop`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl StopPredicate for StopFlag {
    fn should_stop(&self) -> bool {
        self.is_stopped()
    }
}

/// Consumer of published generations (a renderer, a recorder, a logger).
///
/// `present` runs on the display thread while the compute loop is parked,
/// so it sees a generation nobody is writing.
pub trait RenderSink {
    /// Called once per published cycle.
    fn present(&mut self, generation: &Generation);
}

impl<F> RenderSink for F
where
    F: FnMut(&Generation),
{
    fn present(&mut self, generation: &Generation) {
        self(generation);
    }
}

// ============================================================================
// COMPUTE LOOP
// ============================================================================

/// What the compute loop did before exiting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ComputeSummary {
    /// Cycles computed and published.
    pub cycles: u64,
    /// Statistics of the last published cycle.
    pub last_stats: StatsAggregate,
}

/// Producer side: pipeline, swap, hand over.
pub struct ComputeLoop<'a> {
    store: &'a StateStore,
    pipeline: &'a PhysicsPipeline,
    handoff: &'a Handoff,
    clock: StepClock,
}

impl<'a> ComputeLoop<'a> {
    /// Creates a compute loop.
    #[must_use]
    pub fn new(
        store: &'a StateStore,
        pipeline: &'a PhysicsPipeline,
        handoff: &'a Handoff,
        time_step: TimeStep,
    ) -> Self {
        Self {
            store,
            pipeline,
            handoff,
            clock: time_step.clock(),
        }
    }

    /// Runs until `stop` holds, shutdown is signalled, or a cycle fails.
    ///
    /// A failed cycle is never swapped in; the display keeps showing the
    /// last good generation.
    ///
    /// # Errors
    ///
    /// The first pipeline or store error.
    pub fn run(mut self, stop: &dyn StopPredicate) -> SimResult<ComputeSummary> {
        let _guard = ShutdownOnDrop(self.handoff);
        let mut summary = ComputeSummary::default();

        tracing::info!(bodies = self.store.population(), "compute loop started");

        loop {
            if stop.should_stop() {
                break;
            }
            if self.handoff.claim(Side::Compute) == Turn::Shutdown {
                break;
            }
            if stop.should_stop() {
                break;
            }

            let dt = self.clock.next_dt();
            let report = match self.pipeline.run_cycle(self.store, dt) {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        cycle = summary.cycles + 1,
                        "cycle failed, not published"
                    );
                    self.handoff.shutdown();
                    return Err(err);
                }
            };

            if let Err(err) = self.store.swap() {
                tracing::error!(error = %err, "swap refused");
                self.handoff.shutdown();
                return Err(err.into());
            }

            summary.cycles += 1;
            summary.last_stats = report.stats;
            tracing::debug!(
                cycle = report.cycle,
                collisions = report.collisions,
                walls = report.wall_contacts,
                mean_speed = report.stats.mean_speed(),
                "cycle published"
            );

            self.handoff.release(Side::Compute);
        }

        self.handoff.shutdown();
        tracing::info!(cycles = summary.cycles, "compute loop stopped");
        Ok(summary)
    }
}

// ============================================================================
// DISPLAY LOOP
// ============================================================================

/// What the display loop did before exiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplaySummary {
    /// Frames presented.
    pub frames: u64,
    /// Frames whose generation lost the read role while being presented.
    /// Always zero under strict alternation.
    pub stale_frames: u64,
    /// Cycle index of the last presented generation.
    pub last_cycle: u64,
}

/// Consumer side: read the published generation, hand back.
pub struct DisplayLoop<'a, S: RenderSink> {
    store: &'a StateStore,
    handoff: &'a Handoff,
    sink: &'a mut S,
}

impl<'a, S: RenderSink> DisplayLoop<'a, S> {
    /// Creates a display loop presenting into `sink`.
    pub fn new(store: &'a StateStore, handoff: &'a Handoff, sink: &'a mut S) -> Self {
        Self {
            store,
            handoff,
            sink,
        }
    }

    /// Runs until `stop` holds or shutdown is signalled.
    pub fn run(self, stop: &dyn StopPredicate) -> DisplaySummary {
        let _guard = ShutdownOnDrop(self.handoff);
        let mut summary = DisplaySummary::default();

        tracing::info!("display loop started");

        loop {
            if stop.should_stop() {
                break;
            }
            if self.handoff.claim(Side::Display) == Turn::Shutdown {
                break;
            }
            if stop.should_stop() {
                break;
            }

            {
                let frame = self.store.acquire_read();
                self.sink.present(&frame);
                if !frame.holds_read_role() {
                    tracing::warn!(
                        generation = frame.generation_index(),
                        "presented a stale generation"
                    );
                    summary.stale_frames += 1;
                }
                summary.last_cycle = frame.meta().cycle;
            }
            summary.frames += 1;

            self.handoff.release(Side::Display);
        }

        self.handoff.shutdown();
        tracing::info!(frames = summary.frames, "display loop stopped");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_is_constant() {
        let mut clock = TimeStep::Fixed { dt: 0.02 }.clock();
        assert!((clock.next_dt() - 0.02).abs() < f32::EPSILON);
        assert!((clock.next_dt() - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn test_measured_step_is_clamped() {
        let mut clock = TimeStep::Measured { max_dt: 0.001 }.clock();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let dt = clock.next_dt();
        assert!(dt > 0.0 && dt <= 0.001);
    }

    #[test]
    fn test_time_step_validation() {
        assert!(TimeStep::default().validate().is_ok());
        assert!(TimeStep::Fixed { dt: 0.0 }.validate().is_err());
        assert!(TimeStep::Fixed { dt: f32::NAN }.validate().is_err());
        assert!(TimeStep::Measured { max_dt: 1.0 }.validate().is_err());
    }

    #[test]
    fn test_stop_flag_and_closure_predicates() {
        let flag = StopFlag::new();
        let shared = flag.clone();
        assert!(!flag.should_stop());
        shared.stop();
        assert!(flag.should_stop());

        let always = || true;
        assert!(always.should_stop());
    }
}
