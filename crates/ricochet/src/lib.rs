//! # RICOCHET
//!
//! A double-buffered bouncing-body simulation. A compute loop produces
//! generation N+1 while a display loop reads generation N, and the two
//! strictly alternate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              RICOCHET                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐    │
//! │  │  Compute Loop   │     │  State Store    │     │  Display Loop   │    │
//! │  │                 │────>│  (core crate)   │<────│                 │    │
//! │  │ • Pipeline      │write│ • 2 generations │read │ • RenderSink    │    │
//! │  │ • swap()        │     │ • role flip     │     │                 │    │
//! │  └────────┬────────┘     └─────────────────┘     └────────┬────────┘    │
//! │           │                                               │             │
//! │           │              ┌─────────────────┐              │             │
//! │           └─────────────>│    Handoff      │<─────────────┘             │
//! │                          │ strict turns +  │                            │
//! │                          │ shutdown bcast  │                            │
//! │                          └─────────────────┘                            │
//! │                                                                         │
//! │  Pipeline stages run on an ExecutionBackend (serial or rayon pool).     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `backend`: Execution backends and stage dispatch
//! - `physics`: Pure per-body and pairwise kernels
//! - `pipeline`: Prepare → Integrate → Statistics
//! - `handoff`: Two-party turn taking
//! - `loops`: Compute and display loops, time step, stop predicates
//! - `simulation`: Wiring and thread lifecycle
//! - `spawn`: Seeded initial population
//! - `config`: TOML configuration

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod config;
pub mod error;
pub mod handoff;
pub mod loops;
pub mod physics;
pub mod pipeline;
pub mod simulation;
pub mod spawn;

pub use ricochet_core as core;

pub use backend::{BackendSet, ExecutionBackend, ParallelBackend, SerialBackend, StageId};
pub use config::{ArenaConfig, BackendConfig, BulkBackendKind, PopulationConfig, SimulationConfig};
pub use error::{BackendError, BackendResult, ConfigError, SimError, SimResult};
pub use handoff::{Handoff, HandoffFlags, Side, Turn};
pub use loops::{
    ComputeLoop, ComputeSummary, DisplayLoop, DisplaySummary, RenderSink, StepClock, StopFlag,
    StopPredicate, TimeStep,
};
pub use pipeline::{CycleReport, PhysicsPipeline};
pub use simulation::{RunSummary, Simulation};
