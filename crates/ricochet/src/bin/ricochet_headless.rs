//! # Ricochet Headless Driver
//!
//! Runs the simulation with a sink that logs statistics instead of drawing.
//!
//! ```bash
//! # Defaults, 600 frames
//! ./ricochet_headless
//!
//! # Config file, 3600 frames, debug logs
//! RUST_LOG=debug ./ricochet_headless data/ricochet.toml 3600
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};

use ricochet::core::Generation;
use ricochet::{RenderSink, SimResult, Simulation, SimulationConfig};

/// Frames between two statistics lines.
const REPORT_EVERY: u64 = 60;

/// Frames run when none are given on the command line.
const DEFAULT_FRAMES: u64 = 600;

/// Logs a statistics line every [`REPORT_EVERY`] frames.
struct StatsSink<'a> {
    frames: &'a AtomicU64,
}

impl RenderSink for StatsSink<'_> {
    fn present(&mut self, generation: &Generation) {
        let frame = self.frames.fetch_add(1, Ordering::AcqRel) + 1;
        if frame % REPORT_EVERY != 0 {
            return;
        }
        let meta = generation.meta();
        tracing::info!(
            cycle = meta.cycle,
            bodies = generation.len(),
            mean_speed = meta.stats.mean_speed(),
            max_speed = meta.stats.max_speed,
            energy = meta.stats.sum_energy,
            collisions = meta.collisions,
            walls = meta.wall_contacts,
            "frame"
        );
    }
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let frames_limit = match args.next().map(|s| s.parse::<u64>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            tracing::error!(%err, "frame count must be a non-negative integer");
            return ExitCode::FAILURE;
        }
    };

    match run(config_path.as_deref(), frames_limit) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<&str>, frames_limit: u64) -> SimResult<()> {
    let config = match config_path {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    tracing::info!(
        config = config_path.unwrap_or("<defaults>"),
        frames = frames_limit,
        "starting ricochet"
    );

    let simulation = Simulation::new(&config)?;
    let frames = AtomicU64::new(0);
    let mut sink = StatsSink { frames: &frames };
    let stop = || frames.load(Ordering::Acquire) >= frames_limit;

    let summary = simulation.run(&mut sink, &stop)?;

    tracing::info!(
        cycles = summary.cycles,
        frames = summary.frames,
        stale_frames = summary.stale_frames,
        mean_speed = summary.last_stats.mean_speed(),
        swaps = simulation.store().swap_count(),
        "finished"
    );
    Ok(())
}
