use anyhow::Result;
use log::debug;

use crate::geom::Point;
use crate::mesh::instance::Instance;
use crate::mesh::patch::Patch;
use crate::spectrum::Spectrum;

/// Tree position of a patch, recorded by the numbering pass so dense patch
/// ids resolve in O(1) without aliasing the ownership tree.
#[derive(Debug, Clone, Copy)]
struct PatchLoc {
    instance: usize,
    surface: usize,
    patch: usize,
}

/// The whole scene handed to a solver: instances plus the ambient estimate
/// and numbering products derived from them.
#[derive(Debug, Clone)]
pub struct Environment {
    pub instances: Vec<Instance>,
    /// Ambient exitance estimate, written by the solver at close().
    pub ambient: Spectrum,
    bbox: (Point, Point),
    numbered: bool,
    element_count: usize,
    patch_count: usize,
    patch_locs: Vec<PatchLoc>,
}

impl Environment {
    pub fn new(instances: Vec<Instance>) -> Result<Self> {
        let bbox = bounding_box(&instances);
        Ok(Self {
            instances,
            ambient: Spectrum::BLACK,
            bbox,
            numbered: false,
            element_count: 0,
            patch_count: 0,
            patch_locs: Vec::new(),
        })
    }

    /// Assigns every patch and element a dense zero-based id, in traversal
    /// order, and records patch locations for indexed access.
    ///
    /// Runs once; later calls are no-ops. Mutating the geometry after
    /// numbering is undefined.
    pub fn number_elements(&mut self) {
        if self.numbered {
            return;
        }
        let mut pid = 0;
        let mut eid = 0;
        for (ii, instance) in self.instances.iter_mut().enumerate() {
            for (si, surface) in instance.surfaces.iter_mut().enumerate() {
                for (pi, patch) in surface.patches.iter_mut().enumerate() {
                    patch.id = pid;
                    self.patch_locs.push(PatchLoc {
                        instance: ii,
                        surface: si,
                        patch: pi,
                    });
                    pid += 1;
                    for element in patch.elements.iter_mut() {
                        element.id = eid;
                        eid += 1;
                    }
                }
            }
        }
        self.patch_count = pid;
        self.element_count = eid;
        self.numbered = true;
        debug!("numbered environment: {pid} patches, {eid} elements");
    }

    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Total element count; zero before numbering.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Total patch count; zero before numbering.
    pub fn patch_count(&self) -> usize {
        self.patch_count
    }

    /// The patch with the given dense id. Requires a numbered environment.
    pub fn patch(&self, id: usize) -> &Patch {
        let loc = self.patch_locs[id];
        &self.instances[loc.instance].surfaces[loc.surface].patches[loc.patch]
    }

    /// Mutable access to the patch with the given dense id.
    pub fn patch_mut(&mut self, id: usize) -> &mut Patch {
        let loc = self.patch_locs[id];
        &mut self.instances[loc.instance].surfaces[loc.surface].patches[loc.patch]
    }

    /// Axis-aligned bounds over all instance vertices.
    pub fn bounding_box(&self) -> (Point, Point) {
        self.bbox
    }

    /// Recomputes every vertex's exitance (and future slots) as the plain
    /// average over the elements sharing it.
    pub fn interpolate_vertex_exitances(&mut self) {
        for instance in self.instances.iter_mut() {
            let Instance { vertices, surfaces } = instance;

            let horizon = surfaces
                .iter()
                .flat_map(|s| &s.patches)
                .flat_map(|p| &p.elements)
                .map(|e| e.future.len())
                .max()
                .unwrap_or(0);

            let mut counts = vec![0u32; vertices.len()];
            for vertex in vertices.iter_mut() {
                vertex.exitance.reset();
                vertex.future.resize(horizon);
            }

            for surface in surfaces.iter() {
                for patch in &surface.patches {
                    for element in &patch.elements {
                        for &vid in &element.verts {
                            counts[vid] += 1;
                            vertices[vid].exitance.add(&element.exitance);
                            for step in 0..element.future.len() {
                                if let Some(slot) = element.future.get(step) {
                                    vertices[vid].future.deposit(step, slot);
                                }
                            }
                        }
                    }
                }
            }

            for (vertex, &count) in vertices.iter_mut().zip(counts.iter()) {
                if count > 0 {
                    let inv = 1.0 / count as f64;
                    vertex.exitance.scale(inv);
                    vertex.future.scale(inv);
                }
            }
        }
    }
}

fn bounding_box(instances: &[Instance]) -> (Point, Point) {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut any = false;
    for instance in instances {
        for vertex in &instance.vertices {
            let p = vertex.pos;
            min = Point::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Point::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
            any = true;
        }
    }
    if any {
        (min, max)
    } else {
        (Point::new(0., 0., 0.), Point::new(0., 0., 0.))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::surface::Surface;
    use crate::mesh::vertex::Vertex;

    fn unit_quad_instance(z: f64) -> Instance {
        let verts: Vec<Vertex> = [[0., 0., z], [1., 0., z], [1., 1., z], [0., 1., z]]
            .iter()
            .map(|p| Vertex::new(Point::new(p[0], p[1], p[2])))
            .collect();
        let patch = Patch::quad([0, 1, 2, 3], &verts).unwrap();
        let surface = Surface::new(Spectrum::gray(0.5), Spectrum::BLACK, vec![patch]).unwrap();
        Instance::new(verts, vec![surface]).unwrap()
    }

    #[test]
    fn test_numbering_is_dense_and_stable() {
        let mut env = Environment::new(vec![
            unit_quad_instance(0.),
            unit_quad_instance(1.),
            unit_quad_instance(2.),
        ])
        .unwrap();
        env.number_elements();
        assert_eq!(env.patch_count(), 3);
        assert_eq!(env.element_count(), 3);

        let mut element_ids = Vec::new();
        for instance in &env.instances {
            for surface in &instance.surfaces {
                for patch in &surface.patches {
                    for element in &patch.elements {
                        element_ids.push(element.id);
                    }
                }
            }
        }
        element_ids.sort_unstable();
        assert_eq!(element_ids, vec![0, 1, 2]);

        for id in 0..env.patch_count() {
            assert_eq!(env.patch(id).id, id);
        }

        // Re-numbering is a no-op.
        env.number_elements();
        assert_eq!(env.element_count(), 3);
    }

    #[test]
    fn test_bounding_box() {
        let env =
            Environment::new(vec![unit_quad_instance(0.), unit_quad_instance(5.)]).unwrap();
        let (min, max) = env.bounding_box();
        assert!(min.is_close(&Point::new(0., 0., 0.)));
        assert!(max.is_close(&Point::new(1., 1., 5.)));
    }

    #[test]
    fn test_vertex_interpolation_averages_elements() {
        // Two quads sharing an edge: the shared vertices average the two
        // element exitances, the outer ones copy their single element.
        let verts: Vec<Vertex> = [
            [0., 0., 0.],
            [1., 0., 0.],
            [1., 1., 0.],
            [0., 1., 0.],
            [2., 0., 0.],
            [2., 1., 0.],
        ]
        .iter()
        .map(|p| Vertex::new(Point::new(p[0], p[1], p[2])))
        .collect();
        let p0 = Patch::quad([0, 1, 2, 3], &verts).unwrap();
        let p1 = Patch::quad([1, 4, 5, 2], &verts).unwrap();
        let surface = Surface::new(Spectrum::gray(0.5), Spectrum::BLACK, vec![p0, p1]).unwrap();
        let instance = Instance::new(verts, vec![surface]).unwrap();
        let mut env = Environment::new(vec![instance]).unwrap();
        env.number_elements();

        env.instances[0].surfaces[0].patches[0].elements[0].exitance = Spectrum::gray(1.);
        env.instances[0].surfaces[0].patches[1].elements[0].exitance = Spectrum::gray(3.);
        env.interpolate_vertex_exitances();

        let vertices = &env.instances[0].vertices;
        assert_eq!(vertices[0].exitance, Spectrum::gray(1.));
        assert_eq!(vertices[4].exitance, Spectrum::gray(3.));
        // Shared corners see both elements.
        assert_eq!(vertices[1].exitance, Spectrum::gray(2.));
        assert_eq!(vertices[2].exitance, Spectrum::gray(2.));
    }
}
