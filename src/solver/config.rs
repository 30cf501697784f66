use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Tuning options recognized by the solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Stop once unsent flux falls below this fraction of total flux.
    pub stop_criterion: f64,
    /// Hard cap on step count; a safety valve for geometry that never
    /// converges.
    pub max_step: usize,
    /// Hemicube sampling resolution (cells per face edge). Higher is more
    /// precise and more expensive.
    pub resolution: usize,
    /// Propagation speed in scene units per step. Arrival delay is the
    /// rounded patch-to-element distance over this constant.
    pub light_speed: f64,
    /// Number of future-exitance time slots. Arrivals past the horizon are
    /// dropped (and counted).
    pub horizon: usize,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self {
            stop_criterion: 1e-4,
            max_step: 100,
            resolution: 100,
            light_speed: 3e8,
            horizon: 300,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stop_criterion.is_finite() || self.stop_criterion < 0.0 {
            bail!("stop criterion must be finite and non-negative");
        }
        if !self.light_speed.is_finite() || self.light_speed <= 0.0 {
            bail!("propagation speed must be finite and positive");
        }
        if self.resolution < 2 {
            bail!("hemicube resolution must be at least 2");
        }
        if self.horizon == 0 {
            bail!("future-exitance horizon must be at least 1 step");
        }
        Ok(())
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new()
    }
}
