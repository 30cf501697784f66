use anyhow::{Result, bail};

use crate::mesh::patch::Patch;
use crate::spectrum::Spectrum;

/// One flat region with uniform material: reflectance and emittance
/// spectra plus the patches subdividing it.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Component-wise filter applied to every shot received here.
    pub reflectance: Spectrum,
    /// Initial exitance seeded on every patch/element of this surface.
    pub emittance: Spectrum,
    /// Light sources shoot but are not treated as receivers or occluders,
    /// and renderers typically skip them.
    pub is_light: bool,
    /// Absolute step at which this surface starts emitting.
    /// `None` means active from step 0.
    pub activation: Option<usize>,
    pub patches: Vec<Patch>,
}

impl Surface {
    pub fn new(reflectance: Spectrum, emittance: Spectrum, patches: Vec<Patch>) -> Result<Self> {
        if !reflectance.is_valid() {
            bail!("surface reflectance must be finite and non-negative, got {reflectance}");
        }
        if !emittance.is_valid() {
            bail!("surface emittance must be finite and non-negative, got {emittance}");
        }
        if patches.is_empty() {
            bail!("surface has no patches");
        }
        Ok(Self {
            reflectance,
            emittance,
            is_light: false,
            activation: None,
            patches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::vertex::Vertex;
    use crate::Point;

    fn quad_patch() -> (Vec<Vertex>, Patch) {
        let verts: Vec<Vertex> = [[0., 0., 0.], [1., 0., 0.], [1., 1., 0.], [0., 1., 0.]]
            .iter()
            .map(|p| Vertex::new(Point::new(p[0], p[1], p[2])))
            .collect();
        let patch = Patch::quad([0, 1, 2, 3], &verts).unwrap();
        (verts, patch)
    }

    #[test]
    fn test_defaults() {
        let (_, patch) = quad_patch();
        let s = Surface::new(Spectrum::gray(0.5), Spectrum::BLACK, vec![patch]).unwrap();
        assert!(!s.is_light);
        assert!(s.activation.is_none());
    }

    #[test]
    fn test_rejects_negative_channels() {
        let (_, patch) = quad_patch();
        assert!(Surface::new(Spectrum::new(-0.1, 0.5, 0.5), Spectrum::BLACK, vec![patch]).is_err());
        let (_, patch) = quad_patch();
        assert!(
            Surface::new(Spectrum::gray(0.5), Spectrum::new(0., f64::NAN, 0.), vec![patch])
                .is_err()
        );
    }
}
