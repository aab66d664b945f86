//! # Arena
//!
//! Physical constants of the world and its (resizable) walls.
//!
//! The bounds are read once at the start of every cycle by the compute loop
//! and may be changed from any other thread in between. They live in a single
//! `AtomicU64` (two packed `f32`s) so that a resize is never observed
//! half-applied and no lock is needed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::body::Body;
use crate::error::{StoreError, StoreResult};

/// Physical constants applied every cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaParams {
    /// Downward acceleration (units per second squared).
    pub gravity: f32,
    /// Fraction of the normal speed kept after hitting a wall, in (0, 1].
    pub wall_dampening: f32,
    /// Coefficient of restitution for body-body collisions, in (0, 1].
    pub collision_restitution: f32,
    /// Velocity ceiling; faster bodies are rescaled to this speed.
    pub max_speed: f32,
}

impl Default for ArenaParams {
    fn default() -> Self {
        Self {
            gravity: 500.0,
            wall_dampening: 0.8,
            collision_restitution: 0.8,
            max_speed: 1000.0,
        }
    }
}

/// Width and height of the arena at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSize {
    /// Distance between left and right walls.
    pub width: f32,
    /// Distance between ceiling and floor.
    pub height: f32,
}

impl ArenaSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Clamps a body center into `[r, extent - r]` on both axes.
    ///
    /// If an axis is narrower than the body the body is centered on it.
    /// Returns `true` if the position changed.
    pub fn clamp_body(&self, body: &mut Body) -> bool {
        let r = body.radius();
        let x = clamp_axis(body.x, r, self.width);
        let y = clamp_axis(body.y, r, self.height);
        let moved = x != body.x || y != body.y;
        body.x = x;
        body.y = y;
        moved
    }

    /// True if the body satisfies the bounds invariant.
    #[inline]
    #[must_use]
    pub fn contains(&self, body: &Body) -> bool {
        let r = body.radius();
        body.x >= r && body.x <= self.width - r && body.y >= r && body.y <= self.height - r
    }

    fn pack(self) -> u64 {
        (u64::from(self.width.to_bits()) << 32) | u64::from(self.height.to_bits())
    }

    fn unpack(bits: u64) -> Self {
        Self {
            width: f32::from_bits((bits >> 32) as u32),
            height: f32::from_bits(bits as u32),
        }
    }
}

#[inline]
fn clamp_axis(value: f32, radius: f32, extent: f32) -> f32 {
    let hi = extent - radius;
    if hi < radius {
        extent * 0.5
    } else {
        value.clamp(radius, hi)
    }
}

/// Arena walls shared between the compute loop and whoever resizes them.
#[derive(Debug)]
pub struct ArenaBounds {
    packed: AtomicU64,
    /// Smallest accepted width/height (twice the largest radius).
    min_extent: f32,
}

impl ArenaBounds {
    /// Creates bounds that refuse any size below `min_extent` on either axis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ArenaTooSmall`] if `size` is already too small.
    pub fn new(size: ArenaSize, min_extent: f32) -> StoreResult<Self> {
        check_size(size, min_extent)?;
        Ok(Self {
            packed: AtomicU64::new(size.pack()),
            min_extent,
        })
    }

    /// Current size.
    #[inline]
    #[must_use]
    pub fn size(&self) -> ArenaSize {
        ArenaSize::unpack(self.packed.load(Ordering::Acquire))
    }

    /// Changes the size; the next Prepare stage clamps bodies into it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ArenaTooSmall`] and keeps the old size if the
    /// new size could not contain the largest body.
    pub fn resize(&self, width: f32, height: f32) -> StoreResult<()> {
        let size = ArenaSize::new(width, height);
        check_size(size, self.min_extent)?;
        self.packed.store(size.pack(), Ordering::Release);
        Ok(())
    }
}

fn check_size(size: ArenaSize, min_extent: f32) -> StoreResult<()> {
    let ok = size.width.is_finite()
        && size.height.is_finite()
        && size.width >= min_extent
        && size.height >= min_extent;
    if ok {
        Ok(())
    } else {
        Err(StoreError::ArenaTooSmall {
            width: size.width,
            height: size.height,
            min_extent,
        })
    }
}
