//! # Ricochet Core
//!
//! The double-buffered state store behind the Ricochet engine:
//! - A fixed population of circular bodies, allocated once
//! - Exactly two generations of that population, one readable, one writable
//! - A role assignment that only ever changes through [`StateStore::swap`]
//!
//! ## Architecture Rules
//!
//! 1. **No reallocation** - Generations are created at startup and only change role
//! 2. **Plain data** - [`Body`] is `Pod`, generations are contiguous slices
//! 3. **Short critical sections** - The role mutex guards two indices, nothing else
//!
//! ## Example
//!
//! ```rust,ignore
//! use ricochet_core::{Body, StateStore};
//!
//! let store = StateStore::new(vec![Body::new(20.0, 20.0, 5.0, [255, 0, 0, 255])])?;
//!
//! {
//!     let mut write = store.acquire_write()?;
//!     write.bodies_mut()[0].vx = 10.0;
//! }
//! store.swap()?;
//!
//! let read = store.acquire_read();
//! assert_eq!(read.bodies()[0].vx, 10.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;
pub mod body;
pub mod error;
pub mod stats;
pub mod sync;

pub use arena::{ArenaBounds, ArenaParams, ArenaSize};
pub use body::{Body, CycleMeta, Generation};
pub use error::{StoreError, StoreResult};
pub use stats::StatsAggregate;
pub use sync::{ReadHandle, RoleAssignment, StateStore, WriteHandle};
