//! # Engine Error Types
//!
//! All errors that can occur while configuring, starting or running the
//! simulation.
//!
//! None of these are retried. An error either aborts startup or ends the
//! run cooperatively: the compute loop signals stop and wakes the display
//! loop before returning it.

use std::path::PathBuf;

use ricochet_core::StoreError;
use thiserror::Error;

use crate::backend::StageId;

/// Errors reported by an execution backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// A validating backend found a NaN or infinite body after a stage.
    #[error("{stage} left body {index} in a non-finite state")]
    NonFiniteState {
        /// Stage that produced the state.
        stage: StageId,
        /// First offending body.
        index: usize,
    },

    /// A validating backend found a non-finite statistics aggregate.
    #[error("{stage} produced a non-finite statistics aggregate")]
    NonFiniteAggregate {
        /// Stage that produced the aggregate.
        stage: StageId,
    },

    /// The backend refused the dispatch.
    #[error("backend refused {stage}: {reason}")]
    Rejected {
        /// Stage that was refused.
        stage: StageId,
        /// Human-readable reason.
        reason: String,
    },

    /// The backend could not acquire its resources.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}

impl BackendError {
    /// Stage the error is attributed to, if it happened during a dispatch.
    #[must_use]
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Self::NonFiniteState { stage, .. }
            | Self::NonFiniteAggregate { stage }
            | Self::Rejected { stage, .. } => Some(*stage),
            Self::PoolBuild(_) => None,
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors in the configuration file or its values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The TOML did not parse or did not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end a simulation run.
#[derive(Error, Debug)]
pub enum SimError {
    /// Resource acquisition failed before any loop started.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The state store rejected an operation.
    #[error("state store: {0}")]
    Store(#[from] StoreError),

    /// A stage failed mid-pipeline; the cycle was abandoned without a swap.
    #[error("stage {stage} failed: {source}")]
    StageExecution {
        /// Stage that failed.
        stage: StageId,
        /// Backend error.
        #[source]
        source: BackendError,
    },

    /// The compute thread panicked.
    #[error("compute thread panicked")]
    ComputeThreadPanicked,
}

impl From<BackendError> for SimError {
    fn from(err: BackendError) -> Self {
        match err.stage() {
            Some(stage) => Self::StageExecution { stage, source: err },
            None => Self::Initialization(err.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type SimResult<T> = Result<T, SimError>;
