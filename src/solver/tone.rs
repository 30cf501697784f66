//! Pure display-value transforms.
//!
//! The solver exposes raw exitance; mapping it to screen colors is the
//! renderer's job. These two helpers cover the conventional exposure and
//! gamma curves so renderers do not have to re-derive them.

use crate::spectrum::Spectrum;

/// Scales a spectrum by `1.1^exposure`. Exposure 0 is the identity.
pub fn expose(s: Spectrum, exposure: f64) -> Spectrum {
    let mut out = s;
    out.scale(1.1_f64.powf(exposure));
    out
}

/// Raises every channel to `1/gamma`. Gamma 1 is the identity; `gamma`
/// must be positive.
pub fn gamma_correct(s: Spectrum, gamma: f64) -> Spectrum {
    debug_assert!(gamma > 0.0);
    let mut out = s;
    out.pow(1.0 / gamma);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let s = Spectrum::new(0.25, 0.5, 1.0);
        assert_eq!(expose(s, 0.0), s);
        assert_eq!(gamma_correct(s, 1.0), s);
    }

    #[test]
    fn test_exposure_scales() {
        let s = Spectrum::gray(1.0);
        let brighter = expose(s, 10.0);
        assert!((brighter.r - 1.1_f64.powi(10)).abs() < 1e-12);
        let darker = expose(s, -10.0);
        assert!(darker.r < 1.0);
    }

    #[test]
    fn test_gamma_lifts_midtones() {
        let s = Spectrum::gray(0.25);
        let corrected = gamma_correct(s, 2.0);
        assert!((corrected.r - 0.5).abs() < 1e-12);
    }
}
