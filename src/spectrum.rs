use serde::{Deserialize, Serialize};
use std::fmt;

/// Radiant energy split into three color channels.
///
/// All solver quantities (emittance, reflectance, exitance) are spectra.
/// Channels are plain `f64` watts-per-area-style magnitudes; operations on
/// non-negative inputs stay non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Spectrum {
    pub const BLACK: Spectrum = Spectrum {
        r: 0.,
        g: 0.,
        b: 0.,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Same value in all three channels.
    pub fn gray(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn set_to(&mut self, other: &Self) {
        *self = *other;
    }

    pub fn add(&mut self, other: &Self) {
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
    }

    /// Component-wise product; applies `other` as an attenuating filter.
    pub fn multiply(&mut self, other: &Self) {
        self.r *= other.r;
        self.g *= other.g;
        self.b *= other.b;
    }

    pub fn scale(&mut self, factor: f64) {
        self.r *= factor;
        self.g *= factor;
        self.b *= factor;
    }

    pub fn reset(&mut self) {
        *self = Self::BLACK;
    }

    /// Raises every channel to the given power (gamma transform).
    pub fn pow(&mut self, exponent: f64) {
        self.r = self.r.powf(exponent);
        self.g = self.g.powf(exponent);
        self.b = self.b.powf(exponent);
    }

    /// Sum of all channels; the scalar magnitude used by flux bookkeeping.
    pub fn total(&self) -> f64 {
        self.r + self.g + self.b
    }

    pub fn is_black(&self) -> bool {
        self.r <= 0. && self.g <= 0. && self.b <= 0.
    }

    pub fn is_valid(&self) -> bool {
        self.r.is_finite()
            && self.g.is_finite()
            && self.b.is_finite()
            && self.r >= 0.
            && self.g >= 0.
            && self.b >= 0.
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(3);
        write!(
            f,
            "Spectrum({:.prec$}, {:.prec$}, {:.prec$})",
            self.r,
            self.g,
            self.b,
            prec = prec
        )
    }
}
