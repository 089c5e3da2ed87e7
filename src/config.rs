use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::simulation::SimTime;

/// Newton-Raphson stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Largest acceptable |mismatch| in per unit, over all P and Q equations.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 20,
        }
    }
}

impl SolverConfig {
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self> {
        let config = Self {
            tolerance,
            max_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::Configuration(format!(
                "solver tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Configuration(
                "solver max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub start_time: SimTime,
    pub solver: SolverConfig,
    /// Cap on solve/tap cycles the network runs within one instant.
    pub max_tap_iterations: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time: SimTime(0),
            solver: SolverConfig::default(),
            max_tap_iterations: 32,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        if !self.start_time.is_finite() {
            return Err(Error::Configuration(
                "simulation start_time must be finite".to_string(),
            ));
        }
        if self.max_tap_iterations == 0 {
            return Err(Error::Configuration(
                "max_tap_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
