use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Lower bound applied to every re-estimated variance.
    pub variance_floor: f64,
    /// Occupancy (in frames) a state or mixture needs before its parameters are replaced.
    pub min_occupancy: f64,
    pub max_iterations: usize,
    /// Stop once the mean per-frame log-likelihood improves by less than this.
    pub convergence_tolerance: f64,
}

impl TrainerConfig {
    pub const DEFAULT_VARIANCE_FLOOR: f64 = 1e-6;
    pub const DEFAULT_MIN_OCCUPANCY: f64 = 1e-6;
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;
    pub const DEFAULT_CONVERGENCE_TOLERANCE: f64 = 1e-4;

    pub fn load(path: &Path) -> Result<Self, TrainingError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| TrainingError::io("read trainer config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| TrainingError::json("parse trainer config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the M-step cannot honour: a non-positive variance floor or a
    /// negative occupancy threshold.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.variance_floor <= 0.0 || self.variance_floor.is_nan() {
            return Err(TrainingError::parse(
                "trainer config",
                format!("variance_floor must be positive, got {}", self.variance_floor),
            ));
        }
        if self.min_occupancy < 0.0 {
            return Err(TrainingError::parse(
                "trainer config",
                format!("min_occupancy must be non-negative, got {}", self.min_occupancy),
            ));
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            variance_floor: Self::DEFAULT_VARIANCE_FLOOR,
            min_occupancy: Self::DEFAULT_MIN_OCCUPANCY,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            convergence_tolerance: Self::DEFAULT_CONVERGENCE_TOLERANCE,
        }
    }
}
