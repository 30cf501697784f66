use anyhow::{Result, bail};

use crate::geom::{Point, Vector};
use crate::mesh::MIN_AREA;
use crate::mesh::vertex::{FutureExitances, Vertex};
use crate::spectrum::Spectrum;

/// The smallest subdivision unit: a triangle or quad that receives energy
/// and carries the display-granularity exitance.
#[derive(Debug, Clone)]
pub struct Element {
    /// Indices into the owning instance's vertex arena (3 or 4).
    pub verts: Vec<usize>,
    /// Dense id, assigned by the environment's numbering pass.
    pub id: usize,
    pub area: f64,
    pub center: Point,
    pub normal: Vector,
    pub exitance: Spectrum,
    pub future: FutureExitances,
}

impl Element {
    /// Builds an element over the given vertex arena.
    ///
    /// Fails on anything the solver loop could not divide through later:
    /// wrong vertex count, out-of-range indices, non-finite positions,
    /// collinear corners, or a degenerate area.
    pub fn new(verts: Vec<usize>, vertices: &[Vertex]) -> Result<Self> {
        if verts.len() != 3 && verts.len() != 4 {
            bail!("element must have 3 or 4 vertices, got {}", verts.len());
        }
        for &vid in &verts {
            let Some(v) = vertices.get(vid) else {
                bail!("element vertex index {vid} out of range");
            };
            if !v.pos.is_finite() {
                bail!("element vertex {vid} has non-finite coordinates");
            }
        }

        let pts: Vec<Point> = verts.iter().map(|&vid| vertices[vid].pos).collect();
        let Some(normal) = Vector::normal(pts[0], pts[1], pts[2]) else {
            bail!("element corners are collinear");
        };

        let mut area = triangle_area(pts[0], pts[1], pts[2]);
        if pts.len() == 4 {
            area += triangle_area(pts[0], pts[2], pts[3]);
        }
        if area < MIN_AREA {
            bail!("degenerate element (area = {area:e})");
        }

        let inv_n = 1.0 / pts.len() as f64;
        let mut center = Point::new(0., 0., 0.);
        for p in &pts {
            center = center + Vector::new(p.x * inv_n, p.y * inv_n, p.z * inv_n);
        }

        Ok(Self {
            verts,
            id: 0,
            area,
            center,
            normal,
            exitance: Spectrum::BLACK,
            future: FutureExitances::new(),
        })
    }

    pub fn is_quad(&self) -> bool {
        self.verts.len() == 4
    }
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let ab = Vector::from_points(a, b);
    let ac = Vector::from_points(a, c);
    0.5 * ab.cross(ac).length()
}
