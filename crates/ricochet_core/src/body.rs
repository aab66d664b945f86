//! # Bodies and Generations
//!
//! A [`Body`] is pure data with no behavior beyond a few geometric helpers.
//! A [`Generation`] is one complete, fixed-length snapshot of every body.

use bytemuck::{Pod, Zeroable};
use std::ops::Deref;

use crate::error::{StoreError, StoreResult};
use crate::stats::StatsAggregate;

/// A circular body in the arena.
///
/// Radius and color are fixed at construction; position and velocity are
/// rewritten every cycle by the physics pipeline.
///
/// `repr(C)` with no padding: 5 floats + 4 color bytes = 24 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Body {
    /// Center X coordinate.
    pub x: f32,
    /// Center Y coordinate (grows towards the floor).
    pub y: f32,
    /// X velocity in units per second.
    pub vx: f32,
    /// Y velocity in units per second.
    pub vy: f32,
    radius: f32,
    color: [u8; 4],
}

impl Body {
    /// Creates a body at rest.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, radius: f32, color: [u8; 4]) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius,
            color,
        }
    }

    /// Returns the same body with the given velocity.
    #[inline]
    #[must_use]
    pub const fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.vx = vx;
        self.vy = vy;
        self
    }

    /// Radius, fixed for the lifetime of the body.
    #[inline]
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// RGBA display color.
    #[inline]
    #[must_use]
    pub const fn color(&self) -> [u8; 4] {
        self.color
    }

    /// Collision mass, `r²`.
    #[inline]
    #[must_use]
    pub fn mass(&self) -> f32 {
        self.radius * self.radius
    }

    /// Magnitude of the velocity vector.
    #[inline]
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    /// True if every numeric field is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.vx.is_finite()
            && self.vy.is_finite()
            && self.radius.is_finite()
    }
}

/// Bookkeeping published alongside a generation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleMeta {
    /// Compute cycle that produced this generation (0 = initial state).
    pub cycle: u64,
    /// Statistics gathered by the last Statistics stage.
    pub stats: StatsAggregate,
    /// Colliding pairs resolved during the cycle.
    pub collisions: u32,
    /// Wall contacts resolved during the cycle.
    pub wall_contacts: u32,
}

/// One full snapshot of the population.
///
/// The length is fixed at construction; there is no way to push or remove a
/// body afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    bodies: Box<[Body]>,
    meta: CycleMeta,
}

impl Generation {
    /// Builds a generation from an initial population.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyPopulation`] for an empty population and
    /// [`StoreError::InvalidRadius`] for a body whose radius is not positive.
    pub fn from_bodies(bodies: Vec<Body>) -> StoreResult<Self> {
        if bodies.is_empty() {
            return Err(StoreError::EmptyPopulation);
        }
        if let Some((index, body)) = bodies
            .iter()
            .enumerate()
            .find(|(_, b)| !(b.radius() > 0.0 && b.radius().is_finite()))
        {
            return Err(StoreError::InvalidRadius {
                index,
                radius: body.radius(),
            });
        }

        Ok(Self {
            bodies: bodies.into_boxed_slice(),
            meta: CycleMeta::default(),
        })
    }

    /// Number of bodies.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Always false; kept for API symmetry with slices.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Read-only view of the bodies.
    #[inline]
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Mutable view of the bodies. The slice length cannot change.
    #[inline]
    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Raw bytes of the bodies, `24 * len()` long, for copying straight into
    /// a vertex or instance buffer.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bodies)
    }

    /// Metadata of the cycle that produced this generation.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &CycleMeta {
        &self.meta
    }

    /// Replaces the cycle metadata.
    #[inline]
    pub fn set_meta(&mut self, meta: CycleMeta) {
        self.meta = meta;
    }

    /// Overwrites this generation with the contents of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PopulationMismatch`] if the lengths differ.
    pub fn copy_from(&mut self, source: &Self) -> StoreResult<()> {
        if source.len() != self.len() {
            return Err(StoreError::PopulationMismatch {
                expected: self.len(),
                actual: source.len(),
            });
        }
        self.bodies.copy_from_slice(&source.bodies);
        self.meta = source.meta;
        Ok(())
    }
}

impl Deref for Generation {
    type Target = [Body];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.bodies
    }
}
