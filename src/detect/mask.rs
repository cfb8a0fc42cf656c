//! Continuum synthesis: blank out detected lines so a smooth continuum can be
//! fit underneath them.
//!
//! Every sample inside a line window is replaced with low-amplitude noise (a
//! tenth of the flux scatter outside that window), which keeps the masked
//! spectrum on a realistic noise floor instead of leaving holes.

use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::domain::{ResolvedLine, Spectrum};
use crate::math::nan_std;
use crate::models::FWHM_PER_SIGMA;

/// Fraction of the outside-window scatter used for the replacement noise.
const FILL_NOISE_FRACTION: f64 = 0.1;

/// Source of zero-mean noise for the masked regions.
pub trait NoiseSource {
    /// One draw with standard deviation `std`.
    fn sample(&mut self, std: f64) -> f64;
}

/// Normally distributed noise from any `rand` generator.
#[derive(Debug, Clone)]
pub struct GaussianNoise<R: Rng> {
    rng: R,
}

impl<R: Rng> GaussianNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl GaussianNoise<StdRng> {
    /// Reproducible noise for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NoiseSource for GaussianNoise<R> {
    fn sample(&mut self, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * std
    }
}

/// Always zero; masked samples become exactly `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn sample(&mut self, _std: f64) -> f64 {
        0.0
    }
}

/// Masked spectrum flux and which samples are untouched continuum.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub flux: Vec<f64>,
    /// `true` where the sample lies outside every line window.
    pub continuum_mask: Vec<bool>,
    /// Nan-aware standard deviation of `flux`.
    pub noise_estimate: f64,
}

/// Wavelength window `[obs - fwhm/2 - 3σ, obs + fwhm/2 + 3σ]` covered by a line.
pub fn line_window(observed_wavelength: f64, fwhm: f64) -> (f64, f64) {
    let sigma = fwhm / FWHM_PER_SIGMA;
    let half = fwhm / 2.0 + 3.0 * sigma;
    (observed_wavelength - half, observed_wavelength + half)
}

pub fn synthesize(spectrum: &Spectrum, lines: &[ResolvedLine], noise: &mut dyn NoiseSource) -> Synthesis {
    let flux = spectrum.flux();
    let mut synthetic = if flux.iter().all(|f| f.is_nan()) {
        vec![0.0; flux.len()]
    } else {
        flux.to_vec()
    };
    let mut continuum_mask = vec![true; flux.len()];

    for line in lines {
        let (lo, hi) = line_window(line.observed_wavelength, line.fwhm);
        let range = spectrum.index_range(lo, hi);
        if range.is_empty() {
            continue;
        }

        let outside: Vec<f64> = flux[..range.start].iter().chain(&flux[range.end..]).copied().collect();
        let fill_std = nan_std(&outside).map_or(0.0, |s| FILL_NOISE_FRACTION * s);
        debug!(
            "masking {} over [{lo:.3}, {hi:.3}] ({} samples, fill std {fill_std:.4})",
            line.name,
            range.len(),
        );

        for i in range {
            continuum_mask[i] = false;
            synthetic[i] = if fill_std > 0.0 { noise.sample(fill_std) } else { 0.0 };
        }
    }

    let noise_estimate = nan_std(&synthetic).unwrap_or(0.0);
    Synthesis {
        flux: synthetic,
        continuum_mask,
        noise_estimate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(name: &str, observed: f64, fwhm: f64) -> ResolvedLine {
        ResolvedLine {
            name: name.to_string(),
            rest_wavelength: observed,
            observed_wavelength: observed,
            peak_index: 0,
            peak_flux: 1.0,
            fwhm,
        }
    }

    fn ramp_spectrum() -> Spectrum {
        let wl: Vec<f64> = (0..200).map(|i| 4900.0 + i as f64).collect();
        let flux: Vec<f64> = (0..200).map(|i| 1.0 + (i % 7) as f64).collect();
        Spectrum::from_flux(wl, flux).unwrap()
    }

    #[test]
    fn no_window_sample_is_marked_continuum() {
        let spectrum = ramp_spectrum();
        let lines = vec![resolved("a", 4950.0, 6.0), resolved("b", 5050.0, 3.0)];
        let mut noise = GaussianNoise::seeded(7);
        let synthesis = synthesize(&spectrum, &lines, &mut noise);

        for line in &lines {
            let (lo, hi) = line_window(line.observed_wavelength, line.fwhm);
            for (i, &w) in spectrum.wavelength().iter().enumerate() {
                if w >= lo && w <= hi {
                    assert!(!synthesis.continuum_mask[i], "{w} inside {} window", line.name);
                }
            }
        }
        assert!(synthesis.continuum_mask[0]);
        assert!(synthesis.continuum_mask[100]);
    }

    #[test]
    fn masked_samples_are_replaced_and_others_kept() {
        let spectrum = ramp_spectrum();
        let lines = vec![resolved("a", 4950.0, 6.0)];
        let synthesis = synthesize(&spectrum, &lines, &mut ZeroNoise);

        for (i, keep) in synthesis.continuum_mask.iter().enumerate() {
            if *keep {
                assert_eq!(synthesis.flux[i], spectrum.flux()[i]);
            } else {
                assert_eq!(synthesis.flux[i], 0.0);
            }
        }
        assert!(synthesis.noise_estimate > 0.0);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = GaussianNoise::seeded(3);
        let mut b = GaussianNoise::seeded(3);
        for _ in 0..10 {
            assert_eq!(a.sample(2.0), b.sample(2.0));
        }
    }

    #[test]
    fn all_missing_flux_starts_from_zeros() {
        let spectrum = Spectrum::from_flux(vec![1.0, 2.0, 3.0], vec![f64::NAN; 3]).unwrap();
        let synthesis = synthesize(&spectrum, &[], &mut ZeroNoise);
        assert_eq!(synthesis.flux, vec![0.0; 3]);
        assert_eq!(synthesis.noise_estimate, 0.0);
    }

    #[test]
    fn window_spans_half_width_plus_three_sigma() {
        let (lo, hi) = line_window(5000.0, FWHM_PER_SIGMA * 2.0);
        assert!((hi - 5000.0 - (FWHM_PER_SIGMA + 6.0)).abs() < 1e-9);
        assert!((5000.0 - lo - (FWHM_PER_SIGMA + 6.0)).abs() < 1e-9);
    }
}
