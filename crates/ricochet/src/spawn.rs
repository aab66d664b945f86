//! Seeded initial population.
//!
//! Same seed + same configuration = same bodies, on every platform
//! (`ChaCha8Rng` is portable).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ricochet_core::{ArenaSize, Body};

use crate::config::PopulationConfig;

/// Draws `population.count` bodies placed fully inside `size`.
///
/// Radii are uniform in `[min_radius, max_radius]`, each velocity component
/// uniform in `[-max_initial_speed, max_initial_speed]`, and colors are
/// opaque with every channel at least 64 so bodies stay visible on a dark
/// background.
///
/// The caller validates that `size` can hold a body of `max_radius`.
#[must_use]
pub fn populate(population: &PopulationConfig, size: ArenaSize) -> Vec<Body> {
    let mut rng = ChaCha8Rng::seed_from_u64(population.seed);
    let v = population.max_initial_speed;

    (0..population.count)
        .map(|_| {
            let radius = rng.gen_range(population.min_radius..=population.max_radius);
            let x = rng.gen_range(radius..=(size.width - radius).max(radius));
            let y = rng.gen_range(radius..=(size.height - radius).max(radius));
            let (vx, vy) = if v > 0.0 {
                (rng.gen_range(-v..=v), rng.gen_range(-v..=v))
            } else {
                (0.0, 0.0)
            };
            let color = [
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
                255,
            ];
            Body::new(x, y, radius, color).with_velocity(vx, vy)
        })
        .collect()
}
