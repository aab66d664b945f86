//! # Statistics Aggregate
//!
//! Per-cycle population statistics, combined with an associative and
//! commutative reduction so the result does not depend on how a backend
//! splits the work.

/// Sum/max/sum/count over one generation.
///
/// Samples and sums are `f64` so parallel and sequential reductions over
/// `f32` bodies agree to well within `1e-4`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatsAggregate {
    /// Sum of body speeds.
    pub sum_speed: f64,
    /// Largest body speed.
    pub max_speed: f64,
    /// Sum of kinetic + potential energy.
    pub sum_energy: f64,
    /// Number of bodies sampled.
    pub count: u64,
}

impl StatsAggregate {
    /// Identity element of [`combine`](Self::combine).
    pub const IDENTITY: Self = Self {
        sum_speed: 0.0,
        max_speed: 0.0,
        sum_energy: 0.0,
        count: 0,
    };

    /// Aggregate of a single body sample.
    #[inline]
    #[must_use]
    pub fn from_sample(speed: f64, energy: f64) -> Self {
        Self {
            sum_speed: speed,
            max_speed: speed,
            sum_energy: energy,
            count: 1,
        }
    }

    /// Merges two partial aggregates.
    #[inline]
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            sum_speed: self.sum_speed + other.sum_speed,
            max_speed: self.max_speed.max(other.max_speed),
            sum_energy: self.sum_energy + other.sum_energy,
            count: self.count + other.count,
        }
    }

    /// Average speed, or 0 for an empty aggregate.
    #[must_use]
    pub fn mean_speed(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum_speed / self.count as f64
    }

    /// True if every field of `self` is within `tolerance` of `other`
    /// (relative for large magnitudes) and the counts match.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        fn close(a: f64, b: f64, tolerance: f64) -> bool {
            (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
        }
        self.count == other.count
            && close(self.sum_speed, other.sum_speed, tolerance)
            && close(self.max_speed, other.max_speed, tolerance)
            && close(self.sum_energy, other.sum_energy, tolerance)
    }

    /// True if none of the sums has overflowed into NaN or infinity.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.sum_speed.is_finite() && self.max_speed.is_finite() && self.sum_energy.is_finite()
    }
}

impl Default for StatsAggregate {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::iter::Sum for StatsAggregate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::IDENTITY, Self::combine)
    }
}
