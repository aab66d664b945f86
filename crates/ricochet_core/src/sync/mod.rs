//! # Synchronization Primitives for the State Store
//!
//! ## The Problem
//!
//! ```text
//! Compute thread:  WRITE every body, every cycle
//! Display thread:  READ every body, every frame
//!
//! One array:       torn frames (half of cycle N, half of cycle N+1)
//! ```
//!
//! ## The Solution: Double Buffering
//!
//! ```text
//! Cycle N:
//!   Compute writes Generation A (seeded from B)
//!   Display reads Generation B (cycle N-1, settled)
//!
//! swap()
//!
//! Cycle N+1:
//!   Compute writes Generation B (seeded from A)
//!   Display reads Generation A (cycle N, settled)
//! ```
//!
//! The role assignment is two indices behind one mutex. The mutex is held
//! only to read or flip those indices, never while a generation is being
//! written or rendered.

mod double_buffer;

pub use double_buffer::{ReadHandle, RoleAssignment, StateStore, WriteHandle};
