//! Hemicube form-factor estimation.
//!
//! A five-faced projective sampling volume centered on the shooting patch:
//! one face aligned with the patch normal plus four half-height side
//! faces. Candidate elements are clipped against each face frustum in
//! camera space, perspective projected, and scan converted into a grid
//! with a nearest-depth test, so the element closest to the patch claims
//! each cell. Every cell carries a precomputed solid-angle weight (peaked
//! at the face center, decaying toward the edges); the weights of the
//! cells an element wins sum to its form factor.

use std::f64::consts::PI;

use crate::geom::{Point, Vector};
use crate::mesh::Environment;

/// Near-plane offset; geometry coplanar with the patch clips away here.
const NEAR: f64 = 1e-8;

#[derive(Clone, Copy, PartialEq)]
enum Face {
    Top,
    Side,
}

/// A polygon vertex in face camera space.
#[derive(Clone, Copy)]
struct CamPoint {
    x: f64,
    y: f64,
    z: f64,
}

/// A projected vertex in grid coordinates with its depth.
#[derive(Clone, Copy)]
struct GridPoint {
    x: f64,
    y: f64,
    inv_z: f64,
}

/// Form-factor estimator with delta tables precomputed for one sampling
/// resolution.
pub struct HemiCube {
    res: usize,
    /// `res × res` weights for the top face.
    top_deltas: Vec<f64>,
    /// `res × res/2` weights shared by the four side faces.
    side_deltas: Vec<f64>,
}

impl HemiCube {
    /// Builds the delta form-factor tables for the given resolution
    /// (rounded up to an even number of cells per edge).
    pub fn new(resolution: usize) -> Self {
        let res = resolution.max(2);
        let res = res + (res % 2);
        let d = 2.0 / res as f64;
        let da = d * d;

        let mut top_deltas = vec![0.0; res * res];
        for j in 0..res {
            for i in 0..res {
                let u = -1.0 + (i as f64 + 0.5) * d;
                let v = -1.0 + (j as f64 + 0.5) * d;
                top_deltas[j * res + i] = da / (PI * (u * u + v * v + 1.0).powi(2));
            }
        }

        let half = res / 2;
        let mut side_deltas = vec![0.0; res * half];
        for j in 0..half {
            for i in 0..res {
                let u = -1.0 + (i as f64 + 0.5) * d;
                let w = (j as f64 + 0.5) * d;
                side_deltas[j * res + i] = w * da / (PI * (u * u + w * w + 1.0).powi(2));
            }
        }

        // The five faces together cover the hemisphere exactly once.
        let sum: f64 =
            top_deltas.iter().sum::<f64>() + 4.0 * side_deltas.iter().sum::<f64>();
        for v in top_deltas.iter_mut() {
            *v /= sum;
        }
        for v in side_deltas.iter_mut() {
            *v /= sum;
        }

        Self {
            res,
            top_deltas,
            side_deltas,
        }
    }

    pub fn resolution(&self) -> usize {
        self.res
    }

    /// Fills `row[element id]` with the fraction of the shooting patch's
    /// energy intercepted by each element.
    ///
    /// Entries stay zero for the shooter's own elements, for elements of
    /// light surfaces (which neither receive nor occlude) and for anything
    /// on or behind the shooting plane. Deterministic for fixed geometry
    /// and resolution. Requires a numbered environment.
    pub fn form_factors(&self, env: &Environment, shooter_id: usize, row: &mut [f64]) {
        debug_assert_eq!(row.len(), env.element_count());
        row.fill(0.0);

        let shooter = env.patch(shooter_id);
        let n = shooter.normal;
        let center = shooter.center;
        let arbitrary = if n.dx.abs() < 0.9 {
            Vector::new(1., 0., 0.)
        } else {
            Vector::new(0., 1., 0.)
        };
        let u_axis = n
            .cross(arbitrary)
            .normalize()
            .unwrap_or(Vector::new(1., 0., 0.));
        let v_axis = n.cross(u_axis);

        self.rasterize_face(env, shooter_id, center, n, u_axis, v_axis, Face::Top, row);
        for dir in [u_axis, u_axis * -1., v_axis, v_axis * -1.] {
            let right = dir.cross(n);
            self.rasterize_face(env, shooter_id, center, dir, right, n, Face::Side, row);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rasterize_face(
        &self,
        env: &Environment,
        shooter_id: usize,
        center: Point,
        dir: Vector,
        right: Vector,
        up: Vector,
        face: Face,
        row: &mut [f64],
    ) {
        let res = self.res;
        let rows = match face {
            Face::Top => res,
            Face::Side => res / 2,
        };
        // 1/z buffer: larger is nearer, zero is empty.
        let mut depth = vec![0.0_f64; res * rows];
        let mut ids: Vec<Option<usize>> = vec![None; res * rows];

        for instance in &env.instances {
            for surface in &instance.surfaces {
                if surface.is_light {
                    continue;
                }
                for patch in &surface.patches {
                    if patch.id == shooter_id {
                        continue;
                    }
                    for element in &patch.elements {
                        let cam: Vec<CamPoint> = element
                            .verts
                            .iter()
                            .map(|&vid| {
                                let d = Vector::from_points(center, instance.vertices[vid].pos);
                                CamPoint {
                                    x: right.dot(d),
                                    y: up.dot(d),
                                    z: dir.dot(d),
                                }
                            })
                            .collect();
                        let clipped = clip_to_face(&cam, face);
                        if clipped.len() < 3 {
                            continue;
                        }
                        let pts: Vec<GridPoint> = clipped
                            .iter()
                            .map(|p| {
                                let inv_z = 1.0 / p.z;
                                GridPoint {
                                    x: (p.x * inv_z + 1.0) * 0.5 * res as f64,
                                    y: match face {
                                        Face::Top => (p.y * inv_z + 1.0) * 0.5 * res as f64,
                                        Face::Side => p.y * inv_z * 0.5 * res as f64,
                                    },
                                    inv_z,
                                }
                            })
                            .collect();
                        scan_fill(&pts, element.id, res, rows, &mut depth, &mut ids);
                    }
                }
            }
        }

        let deltas = match face {
            Face::Top => &self.top_deltas,
            Face::Side => &self.side_deltas,
        };
        for (idx, id) in ids.iter().enumerate() {
            if let Some(eid) = id {
                row[*eid] += deltas[idx];
            }
        }
    }
}

/// Sutherland-Hodgman clip against the face frustum in camera space.
fn clip_to_face(poly: &[CamPoint], face: Face) -> Vec<CamPoint> {
    let mut out = clip_plane(poly, |p| p.z - NEAR);
    out = clip_plane(&out, |p| p.z - p.x);
    out = clip_plane(&out, |p| p.z + p.x);
    match face {
        Face::Top => {
            out = clip_plane(&out, |p| p.z - p.y);
            out = clip_plane(&out, |p| p.z + p.y);
        }
        Face::Side => {
            // Side faces only see above the patch plane.
            out = clip_plane(&out, |p| p.y);
            out = clip_plane(&out, |p| p.z - p.y);
        }
    }
    out
}

/// Clips against one plane given as a signed distance (inside >= 0).
fn clip_plane(poly: &[CamPoint], dist: impl Fn(&CamPoint) -> f64) -> Vec<CamPoint> {
    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let da = dist(&a);
        let db = dist(&b);
        if da >= 0.0 {
            out.push(a);
            if db < 0.0 {
                out.push(intersect(a, b, da, db));
            }
        } else if db >= 0.0 {
            out.push(intersect(a, b, da, db));
        }
    }
    out
}

fn intersect(a: CamPoint, b: CamPoint, da: f64, db: f64) -> CamPoint {
    let t = da / (da - db);
    CamPoint {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
        z: a.z + t * (b.z - a.z),
    }
}

/// Scan converts a convex polygon in grid coordinates, claiming every cell
/// whose center it covers and where it is nearer than the current holder.
fn scan_fill(
    pts: &[GridPoint],
    element_id: usize,
    width: usize,
    height: usize,
    depth: &mut [f64],
    ids: &mut [Option<usize>],
) {
    let min_y = pts.iter().fold(f64::INFINITY, |m, p| m.min(p.y));
    let max_y = pts.iter().fold(f64::NEG_INFINITY, |m, p| m.max(p.y));
    let j0 = ((min_y - 0.5).ceil() as i64).max(0);
    let j1 = ((max_y - 0.5).floor() as i64).min(height as i64 - 1);

    for j in j0..=j1 {
        let yc = j as f64 + 0.5;

        // Edge crossings with this scanline; convex input gives two.
        let mut x_lo = f64::INFINITY;
        let mut x_hi = f64::NEG_INFINITY;
        let mut iz_lo = 0.0;
        let mut iz_hi = 0.0;
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            if (a.y <= yc) == (b.y <= yc) {
                continue;
            }
            let t = (yc - a.y) / (b.y - a.y);
            let x = a.x + t * (b.x - a.x);
            let iz = a.inv_z + t * (b.inv_z - a.inv_z);
            if x < x_lo {
                x_lo = x;
                iz_lo = iz;
            }
            if x > x_hi {
                x_hi = x;
                iz_hi = iz;
            }
        }
        if x_lo > x_hi {
            continue;
        }

        let i0 = ((x_lo - 0.5).ceil() as i64).max(0);
        let i1 = ((x_hi - 0.5).floor() as i64).min(width as i64 - 1);
        let span = x_hi - x_lo;
        for i in i0..=i1 {
            let xc = i as f64 + 0.5;
            let t = if span > 0.0 { (xc - x_lo) / span } else { 0.0 };
            let iz = iz_lo + t * (iz_hi - iz_lo);
            let idx = j as usize * width + i as usize;
            if iz > depth[idx] {
                depth[idx] = iz;
                ids[idx] = Some(element_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_sum_to_one() {
        for res in [2, 16, 100] {
            let hc = HemiCube::new(res);
            let total: f64 = hc.top_deltas.iter().sum::<f64>()
                + 4.0 * hc.side_deltas.iter().sum::<f64>();
            assert!(
                (total - 1.0).abs() < 1e-12,
                "res {res}: deltas sum to {total}"
            );
        }
    }

    #[test]
    fn test_deltas_peak_at_face_center() {
        let hc = HemiCube::new(16);
        let res = hc.res;
        let center = hc.top_deltas[(res / 2) * res + res / 2];
        let corner = hc.top_deltas[0];
        assert!(center > corner);
    }

    #[test]
    fn test_resolution_rounds_up_to_even() {
        assert_eq!(HemiCube::new(99).resolution(), 100);
        assert_eq!(HemiCube::new(100).resolution(), 100);
        assert_eq!(HemiCube::new(1).resolution(), 2);
    }

    #[test]
    fn test_clip_keeps_fully_visible_polygon() {
        let poly = [
            CamPoint { x: -0.4, y: -0.4, z: 1.0 },
            CamPoint { x: 0.4, y: -0.4, z: 1.0 },
            CamPoint { x: 0.4, y: 0.4, z: 1.0 },
            CamPoint { x: -0.4, y: 0.4, z: 1.0 },
        ];
        let clipped = clip_to_face(&poly, Face::Top);
        assert_eq!(clipped.len(), 4);
    }

    #[test]
    fn test_clip_drops_polygon_behind_eye() {
        let poly = [
            CamPoint { x: -0.4, y: -0.4, z: -1.0 },
            CamPoint { x: 0.4, y: -0.4, z: -1.0 },
            CamPoint { x: 0.0, y: 0.4, z: -1.0 },
        ];
        let clipped = clip_to_face(&poly, Face::Top);
        assert!(clipped.len() < 3);
    }

    #[test]
    fn test_scan_fill_depth_test() {
        // Two full-cover squares; the nearer one must own every cell.
        let far = [
            GridPoint { x: 0.0, y: 0.0, inv_z: 0.5 },
            GridPoint { x: 4.0, y: 0.0, inv_z: 0.5 },
            GridPoint { x: 4.0, y: 4.0, inv_z: 0.5 },
            GridPoint { x: 0.0, y: 4.0, inv_z: 0.5 },
        ];
        let near = [
            GridPoint { x: 0.0, y: 0.0, inv_z: 1.0 },
            GridPoint { x: 4.0, y: 0.0, inv_z: 1.0 },
            GridPoint { x: 4.0, y: 4.0, inv_z: 1.0 },
            GridPoint { x: 0.0, y: 4.0, inv_z: 1.0 },
        ];
        let mut depth = vec![0.0; 16];
        let mut ids = vec![None; 16];
        scan_fill(&far, 0, 4, 4, &mut depth, &mut ids);
        scan_fill(&near, 1, 4, 4, &mut depth, &mut ids);
        assert!(ids.iter().all(|id| *id == Some(1)));

        // Order must not matter.
        let mut depth = vec![0.0; 16];
        let mut ids = vec![None; 16];
        scan_fill(&near, 1, 4, 4, &mut depth, &mut ids);
        scan_fill(&far, 0, 4, 4, &mut depth, &mut ids);
        assert!(ids.iter().all(|id| *id == Some(1)));
    }
}
