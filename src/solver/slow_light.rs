//! Progressive shooting with finite-speed-of-light delivery.
//!
//! Each step, every patch holding unsent exitance shoots it at every
//! visible element through its cached form-factor row. Receivers
//! accumulate the reflectance-filtered shot immediately and also record it
//! in their future-exitance inbox at the arrival step implied by the
//! patch-to-element distance, so a replay can show the light actually
//! traveling.

use anyhow::Result;
use log::{debug, trace};
use rayon::prelude::*;

use crate::geom::Point;
use crate::mesh::{Environment, Patch};
use crate::solver::config::SolverConfig;
use crate::solver::hemicube::HemiCube;
use crate::solver::{Progress, Solver};
use crate::spectrum::Spectrum;

pub struct SlowLight {
    config: SolverConfig,
    /// Form factor determination.
    ffd: HemiCube,
    env: Option<Environment>,
    progress: Progress,
    /// Channel-wise interreflection bias, `1/(1 - avg reflectance)`.
    interreflect: Spectrum,
    /// Set by step(), cleared by close(); gates display recomputation.
    dirty: bool,
}

impl SlowLight {
    pub fn new(config: SolverConfig) -> Self {
        let ffd = HemiCube::new(config.resolution);
        Self {
            config,
            ffd,
            env: None,
            progress: Progress::new(),
            interreflect: Spectrum::gray(1.),
            dirty: false,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl Default for SlowLight {
    fn default() -> Self {
        Self::new(SolverConfig::new())
    }
}

impl Solver for SlowLight {
    fn open(&mut self, mut env: Environment) -> Result<()> {
        self.config.validate()?;
        env.number_elements();
        self.progress = Progress::new();
        self.dirty = false;

        // Clear solving state from any previous run and size the inboxes.
        for instance in env.instances.iter_mut() {
            for vertex in instance.vertices.iter_mut() {
                vertex.exitance.reset();
                vertex.future.resize(self.config.horizon);
            }
            for surface in instance.surfaces.iter_mut() {
                for patch in surface.patches.iter_mut() {
                    patch.unsent.reset();
                    for element in patch.elements.iter_mut() {
                        element.exitance.reset();
                        element.future.resize(self.config.horizon);
                    }
                }
            }
        }

        let (flux, dropped) = seed_emittance(&mut env, 0, true);
        self.progress.total_flux = flux;
        self.progress.unsent_flux = flux;
        self.progress.dropped_shots = dropped;
        self.interreflect = calc_interreflect(&env);
        calc_distances(&mut env);

        debug!(
            "opened environment: {} patches, {} elements, initial flux {flux:.3}",
            env.patch_count(),
            env.element_count(),
        );
        self.env = Some(env);
        Ok(())
    }

    fn step(&mut self) -> bool {
        let Some(env) = self.env.as_mut() else {
            return true;
        };
        if self.progress.step >= self.config.max_step {
            return true;
        }

        let now = self.progress.now;

        // Surfaces scheduled to switch on at this time step.
        if now > 0 {
            let (flux, dropped) = seed_emittance(env, now, false);
            self.progress.total_flux += flux;
            self.progress.dropped_shots += dropped;
        }

        let unsent = unsent_flux(env);
        self.progress.unsent_flux = unsent;
        self.progress.convergence = convergence(unsent, self.progress.total_flux);
        if self.progress.convergence < self.config.stop_criterion {
            return true;
        }

        let patch_count = env.patch_count();
        let element_count = env.element_count();

        for sp in 0..patch_count {
            let (shooter_unsent, shooter_area) = {
                let p = env.patch(sp);
                (p.unsent, p.area)
            };
            if shooter_unsent.is_black() {
                continue;
            }

            if !env.patch(sp).ff_row.is_computed() {
                let mut row = vec![0.0; element_count];
                self.ffd.form_factors(env, sp, &mut row);
                env.patch_mut(sp).ff_row.fill(row);
            }
            let ff = env.patch_mut(sp).ff_row.take();
            let dist = env.patch_mut(sp).dist_row.take();

            let mut dropped = 0_u64;
            for instance in env.instances.iter_mut() {
                for surface in instance.surfaces.iter_mut() {
                    let reflectance = surface.reflectance;
                    for patch in surface.patches.iter_mut() {
                        if patch.id == sp {
                            continue;
                        }
                        let patch_area = patch.area;
                        for ei in 0..patch.elements.len() {
                            let (eid, element_area) = {
                                let e = &patch.elements[ei];
                                (e.id, e.area)
                            };
                            let f = ff[eid];
                            if f <= 0.0 {
                                continue;
                            }

                            let rff = reciprocal_form_factor(f, shooter_area, element_area);
                            let mut shot = shooter_unsent;
                            shot.scale(rff);
                            shot.multiply(&reflectance);

                            let element = &mut patch.elements[ei];
                            element.exitance.add(&shot);
                            if let Some(d) = dist[eid] {
                                let delay = (d / self.config.light_speed).round();
                                let delivered = delay.is_finite()
                                    && element.future.deposit(now + delay as usize, &shot);
                                if !delivered {
                                    dropped += 1;
                                }
                            }

                            // Seed the receiver's next bounce.
                            shot.scale(element_area / patch_area);
                            patch.unsent.add(&shot);
                        }
                    }
                }
            }
            self.progress.dropped_shots += dropped;

            let shooter = env.patch_mut(sp);
            shooter.ff_row.restore(ff);
            shooter.dist_row.restore(dist);
            shooter.unsent.reset();
        }

        self.progress.step += 1;
        self.progress.now += 1;
        let unsent = unsent_flux(env);
        self.progress.unsent_flux = unsent;
        self.progress.convergence = convergence(unsent, self.progress.total_flux);
        self.dirty = true;
        trace!(
            "step {}: convergence {:.6}",
            self.progress.step, self.progress.convergence
        );
        false
    }

    fn close(&mut self) {
        let Some(env) = self.env.as_mut() else {
            return;
        };
        if !self.dirty {
            return;
        }
        let ambient = calc_ambient(env, &self.interreflect);
        env.ambient = ambient;
        env.interpolate_vertex_exitances();
        self.dirty = false;
        debug!(
            "closed at step {}: convergence {:.6}, ambient {ambient}, {} dropped shots",
            self.progress.step, self.progress.convergence, self.progress.dropped_shots
        );
    }

    fn progress(&self) -> Progress {
        self.progress
    }

    fn environment(&self) -> Option<&Environment> {
        self.env.as_ref()
    }

    fn take_environment(&mut self) -> Option<Environment> {
        self.env.take()
    }
}

/// Reciprocal form factor from shooter to receiving element. The clamp
/// bounds energy gain from discretization error.
pub(crate) fn reciprocal_form_factor(ff: f64, shooter_area: f64, element_area: f64) -> f64 {
    (ff * shooter_area / element_area).min(1.0)
}

fn convergence(unsent_flux: f64, total_flux: f64) -> f64 {
    if total_flux <= 0.0 {
        // Nothing emitted yet; not converged (activations may be pending).
        1.0
    } else {
        unsent_flux / total_flux
    }
}

/// Seeds emittance onto every surface due at `now`.
///
/// With `initial` set (at open), surfaces without an activation step are
/// due as well; afterwards only an exact activation match is. Returns the
/// flux added and the number of inbox deposits that missed the horizon.
fn seed_emittance(env: &mut Environment, now: usize, initial: bool) -> (f64, u64) {
    let mut flux = 0.0;
    let mut dropped = 0;
    for instance in env.instances.iter_mut() {
        for surface in instance.surfaces.iter_mut() {
            let due = if initial {
                surface.activation.unwrap_or(0) == 0
            } else {
                surface.activation == Some(now)
            };
            if !due || surface.emittance.is_black() {
                continue;
            }
            let emittance = surface.emittance;
            for patch in surface.patches.iter_mut() {
                patch.unsent.add(&emittance);
                flux += emittance.total() * patch.area;
                for element in patch.elements.iter_mut() {
                    element.exitance.add(&emittance);
                    if !element.future.deposit(now, &emittance) {
                        dropped += 1;
                    }
                }
            }
        }
    }
    (flux, dropped)
}

fn unsent_flux(env: &Environment) -> f64 {
    let mut flux = 0.0;
    for instance in &env.instances {
        for surface in &instance.surfaces {
            for patch in &surface.patches {
                flux += patch.unsent.total() * patch.area;
            }
        }
    }
    flux
}

/// Channel-wise `1/(1 - avg reflectance)`, area-weighted over all patches.
fn calc_interreflect(env: &Environment) -> Spectrum {
    let mut area = 0.0;
    let mut sum = Spectrum::BLACK;
    for instance in &env.instances {
        for surface in &instance.surfaces {
            for patch in &surface.patches {
                area += patch.area;
                let mut r = surface.reflectance;
                r.scale(patch.area);
                sum.add(&r);
            }
        }
    }
    if area <= 0.0 {
        return Spectrum::gray(1.0);
    }
    sum.scale(1.0 / area);
    // The interreflection series diverges at average reflectance 1.
    let f = |c: f64| 1.0 / (1.0 - c.min(0.999));
    Spectrum::new(f(sum.r), f(sum.g), f(sum.b))
}

/// Ambient exitance: area-weighted average unsent exitance, amplified by
/// the interreflection bias.
fn calc_ambient(env: &Environment, interreflect: &Spectrum) -> Spectrum {
    let mut area = 0.0;
    let mut sum = Spectrum::BLACK;
    for instance in &env.instances {
        for surface in &instance.surfaces {
            for patch in &surface.patches {
                area += patch.area;
                let mut unsent = patch.unsent;
                unsent.scale(patch.area);
                sum.add(&unsent);
            }
        }
    }
    if area <= 0.0 {
        return Spectrum::BLACK;
    }
    sum.scale(1.0 / area);
    sum.multiply(interreflect);
    sum
}

/// Fills every patch's distance row to all elements, once per patch.
fn calc_distances(env: &mut Environment) {
    let element_count = env.element_count();
    let mut elements: Vec<(usize, Point, usize)> = Vec::with_capacity(element_count);
    for instance in &env.instances {
        for surface in &instance.surfaces {
            for patch in &surface.patches {
                for element in &patch.elements {
                    elements.push((element.id, element.center, patch.id));
                }
            }
        }
    }

    let mut patches: Vec<&mut Patch> = Vec::new();
    for instance in env.instances.iter_mut() {
        for surface in instance.surfaces.iter_mut() {
            for patch in surface.patches.iter_mut() {
                patches.push(patch);
            }
        }
    }

    // Rows are written once each, by exactly one worker.
    patches.into_par_iter().for_each(|patch| {
        if patch.dist_row.is_computed() {
            return;
        }
        let mut row = vec![None; element_count];
        for &(eid, center, pid) in &elements {
            if pid != patch.id {
                row[eid] = Some(patch.center.dist(&center));
            }
        }
        patch.dist_row.fill(row);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reciprocal_form_factor_clamps_to_one() {
        // Raw form factor times area ratio above 1 must clamp to exactly 1.
        assert_eq!(reciprocal_form_factor(0.9, 10.0, 1.0), 1.0);
        assert_eq!(reciprocal_form_factor(1.0, 1.0, 0.1), 1.0);
        // Below the clamp it is the plain product.
        let rff = reciprocal_form_factor(0.2, 1.0, 0.5);
        assert!((rff - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_convergence_metric() {
        assert_eq!(convergence(0.0, 0.0), 1.0);
        assert_eq!(convergence(0.5, 2.0), 0.25);
        assert_eq!(convergence(0.0, 2.0), 0.0);
    }

    #[test]
    fn test_step_before_open_is_stopped() {
        let mut solver = SlowLight::default();
        assert!(solver.step());
        assert!(solver.environment().is_none());
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let mut config = SolverConfig::new();
        config.light_speed = -1.0;
        let mut solver = SlowLight::new(config);
        let env = Environment::new(vec![]).unwrap();
        assert!(solver.open(env).is_err());
    }
}
