//! # Simulation Configuration
//!
//! Loaded once at startup from TOML. Every section has defaults, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [arena]
//! width = 800.0
//! height = 600.0
//! gravity = 500.0
//!
//! [population]
//! count = 100
//! seed = 42
//!
//! [time_step]
//! mode = "fixed"
//! dt = 0.016666
//!
//! [backend]
//! bulk = "parallel"
//! threads = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use ricochet_core::{ArenaParams, ArenaSize};

use crate::error::ConfigError;
use crate::loops::TimeStep;

/// Arena section: walls and physical constants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Initial arena width.
    pub width: f32,
    /// Initial arena height.
    pub height: f32,
    /// Downward acceleration.
    pub gravity: f32,
    /// Wall restitution, in (0, 1].
    pub wall_dampening: f32,
    /// Body-body restitution, in (0, 1].
    pub collision_restitution: f32,
    /// Velocity ceiling.
    pub max_speed: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let params = ArenaParams::default();
        Self {
            width: 800.0,
            height: 600.0,
            gravity: params.gravity,
            wall_dampening: params.wall_dampening,
            collision_restitution: params.collision_restitution,
            max_speed: params.max_speed,
        }
    }
}

impl ArenaConfig {
    /// Physical constants for the pipeline.
    #[must_use]
    pub fn params(&self) -> ArenaParams {
        ArenaParams {
            gravity: self.gravity,
            wall_dampening: self.wall_dampening,
            collision_restitution: self.collision_restitution,
            max_speed: self.max_speed,
        }
    }

    /// Initial size.
    #[must_use]
    pub fn size(&self) -> ArenaSize {
        ArenaSize::new(self.width, self.height)
    }
}

/// Population section: how the initial bodies are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of bodies, fixed for the run.
    pub count: usize,
    /// Smallest radius.
    pub min_radius: f32,
    /// Largest radius.
    pub max_radius: f32,
    /// Per-axis bound on the initial velocity.
    pub max_initial_speed: f32,
    /// RNG seed; the same seed always yields the same population.
    pub seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            count: 100,
            min_radius: 5.0,
            max_radius: 15.0,
            max_initial_speed: 200.0,
            seed: 0x5EED_BA11,
        }
    }
}

/// Which backend runs the bulk (Integrate) stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkBackendKind {
    /// Rayon pool.
    #[default]
    Parallel,
    /// Calling thread, no validation.
    Serial,
}

/// Backend section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Bulk backend flavor.
    pub bulk: BulkBackendKind,
    /// Worker threads for a parallel backend (0 = automatic).
    pub threads: usize,
}

/// Complete configuration of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Arena section.
    pub arena: ArenaConfig,
    /// Population section.
    pub population: PopulationConfig,
    /// Time step section.
    pub time_step: TimeStep,
    /// Backend section.
    pub backend: BackendConfig,
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// the errors of [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let a = &self.arena;
        let p = &self.population;

        if p.count == 0 {
            return invalid("population.count must be at least 1".into());
        }
        if !(p.min_radius > 0.0 && p.min_radius <= p.max_radius && p.max_radius.is_finite()) {
            return invalid(format!(
                "population radii must satisfy 0 < min_radius <= max_radius (got {} / {})",
                p.min_radius, p.max_radius
            ));
        }
        if !(p.max_initial_speed >= 0.0 && p.max_initial_speed.is_finite()) {
            return invalid(format!(
                "population.max_initial_speed must be finite and >= 0 (got {})",
                p.max_initial_speed
            ));
        }
        if !in_unit_interval(a.wall_dampening) {
            return invalid(format!(
                "arena.wall_dampening must be in (0, 1] (got {})",
                a.wall_dampening
            ));
        }
        if !in_unit_interval(a.collision_restitution) {
            return invalid(format!(
                "arena.collision_restitution must be in (0, 1] (got {})",
                a.collision_restitution
            ));
        }
        if !(a.max_speed > 0.0 && a.max_speed.is_finite()) {
            return invalid(format!("arena.max_speed must be > 0 (got {})", a.max_speed));
        }
        if !a.gravity.is_finite() {
            return invalid("arena.gravity must be finite".into());
        }
        let min_extent = self.min_extent();
        if !(a.width >= min_extent && a.height >= min_extent) {
            return invalid(format!(
                "arena {}x{} cannot hold a body of radius {}",
                a.width, a.height, p.max_radius
            ));
        }
        self.time_step.validate()
    }

    /// Smallest width/height that can still contain the largest body.
    #[must_use]
    pub fn min_extent(&self) -> f32 {
        self.population.max_radius * 2.0
    }
}

fn in_unit_interval(value: f32) -> bool {
    value > 0.0 && value <= 1.0
}
