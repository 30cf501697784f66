use anyhow::{Result, bail};

use crate::geom::{Point, Vector};
use crate::mesh::MIN_AREA;
use crate::mesh::element::Element;
use crate::mesh::vertex::Vertex;
use crate::spectrum::Spectrum;

/// A per-patch cache row with an explicit pending/computed state.
///
/// Rows are sized to the environment's element count and filled at most
/// once. Reading a pending row is an invariant violation, not a runtime
/// condition. `take`/`restore` let the shooting loop detach a row without
/// cloning it.
#[derive(Debug, Clone, Default)]
pub struct LazyRow<T> {
    computed: bool,
    values: Vec<T>,
}

impl<T> LazyRow<T> {
    pub fn pending() -> Self {
        Self {
            computed: false,
            values: Vec::new(),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub fn fill(&mut self, values: Vec<T>) {
        debug_assert!(!self.computed, "cache row filled twice");
        self.values = values;
        self.computed = true;
    }

    pub fn values(&self) -> &[T] {
        debug_assert!(self.computed, "read of a pending cache row");
        &self.values
    }

    pub fn take(&mut self) -> Vec<T> {
        debug_assert!(self.computed, "take of a pending cache row");
        std::mem::take(&mut self.values)
    }

    pub fn restore(&mut self, values: Vec<T>) {
        debug_assert!(self.computed);
        self.values = values;
    }
}

/// The shooting/bookkeeping granularity: a flat group of elements with an
/// aggregate unsent exitance and two lazily computed rows over all
/// environment elements (form factors and center distances).
#[derive(Debug, Clone)]
pub struct Patch {
    /// Corner indices into the owning instance's vertex arena (3 or 4).
    pub verts: Vec<usize>,
    pub elements: Vec<Element>,
    /// Dense id, assigned by the environment's numbering pass.
    pub id: usize,
    /// Sum of element areas.
    pub area: f64,
    pub center: Point,
    pub normal: Vector,
    /// Exitance accumulated on this patch and not yet shot.
    pub unsent: Spectrum,
    pub ff_row: LazyRow<f64>,
    /// Center distance to every element; the self entries stay `None`.
    pub dist_row: LazyRow<Option<f64>>,
}

impl Patch {
    pub fn new(verts: Vec<usize>, elements: Vec<Element>, vertices: &[Vertex]) -> Result<Self> {
        if verts.len() != 3 && verts.len() != 4 {
            bail!("patch must have 3 or 4 corners, got {}", verts.len());
        }
        if elements.is_empty() {
            bail!("patch has no elements");
        }
        for &vid in &verts {
            let Some(v) = vertices.get(vid) else {
                bail!("patch corner index {vid} out of range");
            };
            if !v.pos.is_finite() {
                bail!("patch corner {vid} has non-finite coordinates");
            }
        }

        let pts: Vec<Point> = verts.iter().map(|&vid| vertices[vid].pos).collect();
        let Some(normal) = Vector::normal(pts[0], pts[1], pts[2]) else {
            bail!("patch corners are collinear");
        };

        let area: f64 = elements.iter().map(|e| e.area).sum();
        if area < MIN_AREA {
            bail!("degenerate patch (area = {area:e})");
        }

        let inv_n = 1.0 / pts.len() as f64;
        let mut center = Point::new(0., 0., 0.);
        for p in &pts {
            center = center + Vector::new(p.x * inv_n, p.y * inv_n, p.z * inv_n);
        }

        Ok(Self {
            verts,
            elements,
            id: 0,
            area,
            center,
            normal,
            unsent: Spectrum::BLACK,
            ff_row: LazyRow::pending(),
            dist_row: LazyRow::pending(),
        })
    }

    /// An unsubdivided quad patch: one element spanning the whole patch.
    pub fn quad(verts: [usize; 4], vertices: &[Vertex]) -> Result<Self> {
        let element = Element::new(verts.to_vec(), vertices)?;
        Self::new(verts.to_vec(), vec![element], vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(pts: &[[f64; 3]]) -> Vec<Vertex> {
        pts.iter()
            .map(|p| Vertex::new(Point::new(p[0], p[1], p[2])))
            .collect()
    }

    #[test]
    fn test_quad_patch() {
        let verts = arena(&[[-1., 1., 0.], [-1., -1., 0.], [1., -1., 0.], [1., 1., 0.]]);
        let p = Patch::quad([0, 1, 2, 3], &verts).unwrap();
        assert_eq!(p.elements.len(), 1);
        assert!((p.area - 4.).abs() < 1e-12);
        assert!(p.center.is_close(&Point::new(0., 0., 0.)));
    }

    #[test]
    fn test_rejects_degenerate() {
        let verts = arena(&[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.], [3., 0., 0.]]);
        assert!(Patch::quad([0, 1, 2, 3], &verts).is_err());
    }

    #[test]
    fn test_lazy_row_lifecycle() {
        let mut row: LazyRow<f64> = LazyRow::pending();
        assert!(!row.is_computed());
        row.fill(vec![1., 2., 3.]);
        assert!(row.is_computed());
        assert_eq!(row.values(), &[1., 2., 3.]);

        let taken = row.take();
        assert_eq!(taken.len(), 3);
        row.restore(taken);
        assert_eq!(row.values()[1], 2.);
    }
}
