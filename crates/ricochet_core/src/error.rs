//! # Store Error Types
//!
//! All errors that can occur while constructing or accessing the state store.

use thiserror::Error;

/// Errors that can occur in the state store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A write handle is already live (second acquire, or swap before drop).
    #[error("write handle already active on generation {index}")]
    WriteHandleActive {
        /// Generation the live write handle points at.
        index: usize,
    },

    /// Two generations with different population sizes were combined.
    #[error("population mismatch: expected {expected} bodies, got {actual}")]
    PopulationMismatch {
        /// Population size of the destination.
        expected: usize,
        /// Population size of the source.
        actual: usize,
    },

    /// A store was requested for zero bodies.
    #[error("population must contain at least one body")]
    EmptyPopulation,

    /// A body was constructed with a radius that is not strictly positive.
    #[error("body {index} has invalid radius {radius}")]
    InvalidRadius {
        /// Index of the offending body.
        index: usize,
        /// The rejected radius.
        radius: f32,
    },

    /// The arena cannot contain the largest body.
    #[error("arena {width}x{height} is smaller than required extent {min_extent}")]
    ArenaTooSmall {
        /// Requested width.
        width: f32,
        /// Requested height.
        height: f32,
        /// Smallest allowed width and height.
        min_extent: f32,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
