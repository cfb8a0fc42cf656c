//! Line-shape evaluation.
//!
//! The pipeline only needs two primitive operations:
//! - evaluate a line profile at `x` for a parameter vector
//! - evaluate the continuum at `x`
//!
//! Both are exposed through `LineShapeProvider` so a caller can swap in its own
//! evaluators (e.g. an exact Faddeeva-based Voigt). `AnalyticProfiles` is the
//! built-in implementation.

use crate::domain::LineProfile;

/// `2 * sqrt(2 * ln 2)`: FWHM of a unit-sigma Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Pure, side-effect-free profile evaluators.
pub trait LineShapeProvider: Sync {
    /// Evaluate a line profile. Parameter layout follows `RowParams`.
    fn evaluate(&self, profile: LineProfile, x: &[f64], params: &[f64]) -> Vec<f64>;

    /// Evaluate the continuum model.
    fn continuum(&self, x: &[f64], amplitude: f64, location: f64, shape: f64) -> Vec<f64>;
}

/// Closed-form profiles, all normalized to `amplitude` at the centroid.
///
/// - Gaussian: `a * exp(-(x - c)^2 / (2 σ^2))`
/// - Lorentzian: `a * γ^2 / ((x - c)^2 + γ^2)` (γ = half width at half maximum)
/// - Voigt: Thompson–Cox–Hastings pseudo-Voigt
/// - continuum: power law `a * (x / x0)^k`
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticProfiles;

impl LineShapeProvider for AnalyticProfiles {
    fn evaluate(&self, profile: LineProfile, x: &[f64], params: &[f64]) -> Vec<f64> {
        match profile {
            LineProfile::Gaussian => x.iter().map(|&xi| gaussian(xi, params[0], params[1], params[2])).collect(),
            LineProfile::Lorentzian => x
                .iter()
                .map(|&xi| lorentzian(xi, params[0], params[1], params[2]))
                .collect(),
            LineProfile::Voigt => x
                .iter()
                .map(|&xi| pseudo_voigt(xi, params[0], params[1], params[2], params[3]))
                .collect(),
        }
    }

    fn continuum(&self, x: &[f64], amplitude: f64, location: f64, shape: f64) -> Vec<f64> {
        x.iter().map(|&xi| power_law(xi, amplitude, location, shape)).collect()
    }
}

pub fn gaussian(x: f64, center: f64, amplitude: f64, sigma: f64) -> f64 {
    let z = (x - center) / sigma;
    amplitude * (-0.5 * z * z).exp()
}

pub fn lorentzian(x: f64, center: f64, amplitude: f64, gamma: f64) -> f64 {
    let d = x - center;
    let g2 = gamma * gamma;
    amplitude * g2 / (d * d + g2)
}

pub fn pseudo_voigt(x: f64, center: f64, amplitude: f64, sigma: f64, gamma: f64) -> f64 {
    let f_g = FWHM_PER_SIGMA * sigma.abs();
    let f_l = 2.0 * gamma.abs();
    let f = (f_g.powi(5)
        + 2.69269 * f_g.powi(4) * f_l
        + 2.42843 * f_g.powi(3) * f_l.powi(2)
        + 4.47163 * f_g.powi(2) * f_l.powi(3)
        + 0.07842 * f_g * f_l.powi(4)
        + f_l.powi(5))
    .powf(0.2);
    if f <= 0.0 {
        return if x == center { amplitude } else { 0.0 };
    }
    let r = f_l / f;
    let eta = 1.36603 * r - 0.47719 * r * r + 0.11116 * r * r * r;
    let l = lorentzian(x, center, 1.0, f / 2.0);
    let g = gaussian(x, center, 1.0, f / FWHM_PER_SIGMA);
    amplitude * (eta * l + (1.0 - eta) * g)
}

pub fn power_law(x: f64, amplitude: f64, location: f64, shape: f64) -> f64 {
    amplitude * (x / location).powf(shape)
}
