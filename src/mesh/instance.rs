use anyhow::{Result, bail};

use crate::mesh::surface::Surface;
use crate::mesh::vertex::Vertex;

/// One placed object: a vertex arena shared by a set of surfaces whose
/// coordinate transform is already baked into the positions.
#[derive(Debug, Clone)]
pub struct Instance {
    pub vertices: Vec<Vertex>,
    pub surfaces: Vec<Surface>,
}

impl Instance {
    pub fn new(vertices: Vec<Vertex>, surfaces: Vec<Surface>) -> Result<Self> {
        for (i, v) in vertices.iter().enumerate() {
            if !v.pos.is_finite() {
                bail!("vertex {i} has non-finite coordinates");
            }
        }
        // Elements and patches were validated against an arena at
        // construction; re-check index ranges against *this* arena.
        for surface in &surfaces {
            for patch in &surface.patches {
                for &vid in &patch.verts {
                    if vid >= vertices.len() {
                        bail!("patch corner index {vid} out of range");
                    }
                }
                for element in &patch.elements {
                    for &vid in &element.verts {
                        if vid >= vertices.len() {
                            bail!("element vertex index {vid} out of range");
                        }
                    }
                }
            }
        }
        Ok(Self { vertices, surfaces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::patch::Patch;
    use crate::spectrum::Spectrum;
    use crate::Point;

    #[test]
    fn test_rejects_foreign_indices() {
        let verts: Vec<Vertex> = [[0., 0., 0.], [1., 0., 0.], [1., 1., 0.], [0., 1., 0.]]
            .iter()
            .map(|p| Vertex::new(Point::new(p[0], p[1], p[2])))
            .collect();
        let patch = Patch::quad([0, 1, 2, 3], &verts).unwrap();
        let surface = Surface::new(Spectrum::gray(0.5), Spectrum::BLACK, vec![patch]).unwrap();

        // Same surfaces against a truncated arena must fail.
        let truncated = verts[..2].to_vec();
        assert!(Instance::new(truncated, vec![surface.clone()]).is_err());
        assert!(Instance::new(verts, vec![surface]).is_ok());
    }
}
