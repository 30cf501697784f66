//! Radiosity solving strategies.
//!
//! Strategies implement [`Solver`]; the environment is handed over at
//! `open()`, mutated by repeated `step()` calls, and read back after
//! `close()`. One strategy is provided: [`slow_light::SlowLight`],
//! progressive shooting with finite-light-speed delivery.

pub mod config;
pub mod hemicube;
pub mod slow_light;
pub mod tone;

use anyhow::Result;

use crate::mesh::Environment;

/// Convergence bookkeeping shared by solving strategies.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Number of completed steps.
    pub step: usize,
    /// Absolute time marker used for delayed delivery.
    pub now: usize,
    /// Remaining unsent flux over total emitted flux. Stays 1 until
    /// something has been emitted.
    pub convergence: f64,
    /// Total flux emitted so far (grows when surfaces activate).
    pub total_flux: f64,
    /// Flux still waiting on patches.
    pub unsent_flux: f64,
    /// Shots whose arrival step fell beyond the future-exitance horizon.
    pub dropped_shots: u64,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            step: 0,
            now: 0,
            convergence: 1.0,
            total_flux: 0.0,
            unsent_flux: 0.0,
            dropped_shots: 0,
        }
    }
}

/// The open/step/close state machine common to all solving strategies.
pub trait Solver {
    /// Takes ownership of the environment, runs numbering, seeds initial
    /// exitance and precomputes per-patch caches.
    fn open(&mut self, env: Environment) -> Result<()>;

    /// Advances the simulation by one step.
    ///
    /// Returns true when stopped: either the convergence metric fell below
    /// the stop criterion or the step cap was reached (distinguish via
    /// [`Solver::progress`]). A stopped solver does no further work.
    fn step(&mut self) -> bool;

    /// Finalizes ambient and per-vertex display values. Idempotent; does
    /// nothing unless a step ran since the last close.
    fn close(&mut self);

    fn progress(&self) -> Progress;

    /// The environment held between open() and close(), if any.
    fn environment(&self) -> Option<&Environment>;

    /// Releases the environment back to the caller.
    fn take_environment(&mut self) -> Option<Environment>;
}
