//! # Ricochet Physics Kernels
//!
//! Pure functions applied by the pipeline stages. Nothing here knows about
//! generations, backends or threads.
//!
//! Conventions:
//! - Screen coordinates: `y` grows downward, the floor is at `y = height`.
//! - Mass is `r²`.
//! - Pairwise response is computed once per unordered pair, visiting
//!   `(i, j)` with `i < j` in ascending order.

use ricochet_core::{ArenaParams, ArenaSize, Body, StatsAggregate};

/// What happened to one pair during the pairwise phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairOutcome {
    /// Not overlapping.
    Separated,
    /// Centers coincide exactly; no normal exists, response skipped.
    Coincident,
    /// Overlapping; overlap corrected, impulse applied if approaching.
    Resolved,
}

/// Stage A kernel: copy a settled body and clamp it into the current arena.
#[inline]
#[must_use]
pub fn prepare_body(source: &Body, size: ArenaSize) -> Body {
    let mut body = *source;
    size.clamp_body(&mut body);
    body
}

/// Stage B, per-body phase: gravity, integration, walls, velocity ceiling.
///
/// Returns the number of walls touched (0, 1 or 2).
pub fn integrate_body(body: &mut Body, params: &ArenaParams, size: ArenaSize, dt: f32) -> u32 {
    body.vy += params.gravity * dt;
    body.x += body.vx * dt;
    body.y += body.vy * dt;

    let r = body.radius();
    let d = params.wall_dampening;
    let mut contacts = 0;

    if body.x < r {
        body.x = r;
        if body.vx < 0.0 {
            body.vx = -body.vx * d;
        }
        contacts += 1;
    } else if body.x > size.width - r {
        body.x = size.width - r;
        if body.vx > 0.0 {
            body.vx = -body.vx * d;
        }
        contacts += 1;
    }

    if body.y < r {
        body.y = r;
        if body.vy < 0.0 {
            body.vy = -body.vy * d;
        }
        contacts += 1;
    } else if body.y > size.height - r {
        body.y = size.height - r;
        if body.vy > 0.0 {
            body.vy = -body.vy * d;
        }
        contacts += 1;
    }

    limit_speed(body, params.max_speed);
    contacts
}

/// Uniformly rescales the velocity so `|v| <= max_speed`.
#[inline]
pub fn limit_speed(body: &mut Body, max_speed: f32) {
    let speed = body.speed();
    if speed > max_speed {
        let scale = max_speed / speed;
        body.vx *= scale;
        body.vy *= scale;
    }
}

/// Stage B, pairwise phase for one pair.
///
/// `a` is the lower index. The physical result does not depend on which
/// body is passed first.
pub fn resolve_pair(a: &mut Body, b: &mut Body, restitution: f32) -> PairOutcome {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let reach = a.radius() + b.radius();
    let dist_sq = dx * dx + dy * dy;

    if dist_sq >= reach * reach {
        return PairOutcome::Separated;
    }
    if dist_sq == 0.0 {
        return PairOutcome::Coincident;
    }

    let dist = dist_sq.sqrt();
    let nx = dx / dist;
    let ny = dy / dist;

    let ma = a.mass();
    let mb = b.mass();
    let inv_a = 1.0 / ma;
    let inv_b = 1.0 / mb;

    // Relative velocity along the normal; negative means approaching.
    let vn = (b.vx - a.vx) * nx + (b.vy - a.vy) * ny;
    if vn < 0.0 {
        let j = -(1.0 + restitution) * vn / (inv_a + inv_b);
        a.vx -= j * inv_a * nx;
        a.vy -= j * inv_a * ny;
        b.vx += j * inv_b * nx;
        b.vy += j * inv_b * ny;
    }

    let overlap = reach - dist;
    let total = ma + mb;
    let push_a = overlap * (mb / total);
    let push_b = overlap * (ma / total);
    a.x -= nx * push_a;
    a.y -= ny * push_a;
    b.x += nx * push_b;
    b.y += ny * push_b;

    PairOutcome::Resolved
}

/// Counts from one pairwise sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepCounts {
    /// Pairs resolved.
    pub resolved: u32,
    /// Pairs skipped because their centers coincide.
    pub coincident: u32,
}

/// Stage B, pairwise phase: every unordered pair once, `i < j` ascending,
/// then every body is clamped back into the arena.
pub fn resolve_collisions(bodies: &mut [Body], restitution: f32, size: ArenaSize) -> SweepCounts {
    let mut counts = SweepCounts::default();

    for i in 0..bodies.len() {
        let (head, tail) = bodies.split_at_mut(i + 1);
        let a = &mut head[i];
        for b in tail.iter_mut() {
            match resolve_pair(a, b, restitution) {
                PairOutcome::Separated => {}
                PairOutcome::Coincident => counts.coincident += 1,
                PairOutcome::Resolved => counts.resolved += 1,
            }
        }
    }

    // Overlap correction may push a body through a wall.
    for body in bodies.iter_mut() {
        size.clamp_body(body);
    }

    counts
}

/// Stage C kernel: speed and energy of one body.
///
/// Energy is `½·m·|v|² + m·g·h` with `h` the height of the body's lowest
/// point above the floor.
#[must_use]
pub fn sample_body(body: &Body, params: &ArenaParams, size: ArenaSize) -> StatsAggregate {
    let speed = f64::from(body.speed());
    let mass = f64::from(body.mass());
    let height = f64::from((size.height - body.radius() - body.y).max(0.0));

    let kinetic = 0.5 * mass * speed * speed;
    let potential = mass * f64::from(params.gravity) * height;
    StatsAggregate::from_sample(speed, kinetic + potential)
}
