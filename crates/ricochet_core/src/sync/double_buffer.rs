//! # Double-Buffered State Store
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │         StateStore          │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │  Gen 0  │  │  Gen 1  │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       │            │        │
//!                    │  ┌────┴────────────┴────┐   │
//!                    │  │ Mutex<(read, write)> │   │
//!                    │  └──────────────────────┘   │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!      ┌──────────────┐ ┌────────────┐ ┌────────────┐
//!      │ WriteHandle  │ │ ReadHandle │ │   swap()   │
//!      │  (Compute)   │ │ (Display)  │ │ (Compute)  │
//!      └──────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! - `WriteHandle`: exclusive access to the write-role generation, one at a time
//! - `ReadHandle`: shared access to the read-role generation, many allowed
//! - `swap()`: flips the roles; refused while a write handle is live
//!
//! Each generation sits behind its own `RwLock`. In the normal alternation
//! those locks are never contended; they turn a protocol bug into a wait
//! instead of a torn read.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::body::{Body, Generation};
use crate::error::{StoreError, StoreResult};

/// Which generation is readable and which is writable.
///
/// Invariant: `read != write`, both in `{0, 1}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Index of the read-role generation.
    pub read: usize,
    /// Index of the write-role generation.
    pub write: usize,
}

impl RoleAssignment {
    const INITIAL: Self = Self { read: 0, write: 1 };

    #[inline]
    fn flipped(self) -> Self {
        Self {
            read: self.write,
            write: self.read,
        }
    }
}

/// Owner of both generations and of the role assignment.
///
/// ## Usage
///
/// ```rust,ignore
/// let store = StateStore::new(initial_bodies)?;
///
/// // Compute side
/// {
///     let source = store.acquire_read();
///     let mut target = store.acquire_write()?;
///     target.copy_from(&source)?;
///     // ... mutate target ...
/// } // both handles dropped here
/// store.swap()?;
///
/// // Display side
/// let frame = store.acquire_read();
/// render(frame.bodies());
/// ```
pub struct StateStore {
    /// The two generations. Never reallocated.
    generations: [RwLock<Generation>; 2],

    /// Current role assignment. Held only to read or flip it.
    roles: Mutex<RoleAssignment>,

    /// Whether a write handle is currently held.
    write_active: AtomicBool,

    /// Number of completed swaps.
    swap_count: AtomicU64,

    /// Population size, fixed at construction.
    population: usize,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("population", &self.population)
            .field("roles", &self.roles())
            .field("write_active", &self.is_write_active())
            .field("swap_count", &self.swap_count())
            .finish()
    }
}

impl StateStore {
    /// Creates a store whose two generations both start as `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the population is empty or contains a body with a
    /// non-positive radius.
    pub fn new(initial: Vec<Body>) -> StoreResult<Self> {
        let first = Generation::from_bodies(initial)?;
        let second = first.clone();
        let population = first.len();

        Ok(Self {
            generations: [RwLock::new(first), RwLock::new(second)],
            roles: Mutex::new(RoleAssignment::INITIAL),
            write_active: AtomicBool::new(false),
            swap_count: AtomicU64::new(0),
            population,
        })
    }

    /// Number of bodies in each generation.
    #[must_use]
    pub fn population(&self) -> usize {
        self.population
    }

    /// Snapshot of the current role assignment.
    #[inline]
    #[must_use]
    pub fn roles(&self) -> RoleAssignment {
        *self.roles.lock()
    }

    /// Number of swaps performed since construction.
    #[inline]
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::Relaxed)
    }

    /// Returns whether a write handle is currently active.
    #[inline]
    #[must_use]
    pub fn is_write_active(&self) -> bool {
        self.write_active.load(Ordering::Acquire)
    }

    /// Gets a shared handle to the read-role generation.
    ///
    /// Multiple read handles can coexist. The handle is re-validated after
    /// the generation lock is taken, so it never points at a generation that
    /// was handed the write role in between.
    #[must_use]
    pub fn acquire_read(&self) -> ReadHandle<'_> {
        loop {
            let index = self.roles.lock().read;
            let guard = self.generations[index].read();

            if self.roles.lock().read == index {
                return ReadHandle {
                    store: self,
                    index,
                    guard,
                };
            }
            // Swapped between the two role reads; retry on the new index.
        }
    }

    /// Gets the exclusive handle to the write-role generation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WriteHandleActive`] if a write handle is
    /// already held (only one allowed).
    pub fn acquire_write(&self) -> StoreResult<WriteHandle<'_>> {
        // Claim under the roles lock so no swap lands between the claim and
        // the index read. Once claimed, swap is refused until release.
        let roles = self.roles.lock();
        let index = roles.write;
        if self.write_active.swap(true, Ordering::AcqRel) {
            return Err(StoreError::WriteHandleActive { index });
        }
        drop(roles);

        let guard = self.generations[index].write();

        Ok(WriteHandle {
            store: self,
            index,
            guard,
        })
    }

    /// Exchanges the read and write roles.
    ///
    /// After the swap the generation just written becomes readable, and the
    /// previously readable one (content from two cycles ago) becomes the next
    /// write target.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WriteHandleActive`] if a write handle is still
    /// held; the roles are left unchanged.
    pub fn swap(&self) -> StoreResult<()> {
        let mut roles = self.roles.lock();

        if self.write_active.load(Ordering::Acquire) {
            return Err(StoreError::WriteHandleActive { index: roles.write });
        }

        *roles = roles.flipped();
        drop(roles);

        self.swap_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Exclusive handle to the write-role generation.
///
/// Only one write handle can exist at a time. Dropping it releases the
/// generation and allows [`StateStore::swap`].
pub struct WriteHandle<'a> {
    store: &'a StateStore,
    index: usize,
    guard: RwLockWriteGuard<'a, Generation>,
}

impl WriteHandle<'_> {
    /// Returns the generation index this handle writes to (for debugging).
    #[inline]
    #[must_use]
    pub fn generation_index(&self) -> usize {
        self.index
    }
}

impl Deref for WriteHandle<'_> {
    type Target = Generation;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for WriteHandle<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for WriteHandle<'_> {
    fn drop(&mut self) {
        self.store.write_active.store(false, Ordering::Release);
    }
}

/// Shared handle to the read-role generation.
pub struct ReadHandle<'a> {
    store: &'a StateStore,
    index: usize,
    guard: RwLockReadGuard<'a, Generation>,
}

impl ReadHandle<'_> {
    /// Returns the generation index this handle reads from (for debugging).
    #[inline]
    #[must_use]
    pub fn generation_index(&self) -> usize {
        self.index
    }

    /// True while the generation behind this handle still holds the read role.
    #[must_use]
    pub fn holds_read_role(&self) -> bool {
        self.store.roles().read == self.index
    }
}

impl Deref for ReadHandle<'_> {
    type Target = Generation;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}
