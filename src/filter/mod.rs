//! Significance filtering of detected lines.
//!
//! A line survives if it lies in the fitting range and either stands out from
//! its local (masked) surroundings or is bright in absolute terms:
//!
//! - core: `obs ± 2σ`, with `σ = fwhm / (2 sqrt(2 ln 2))`
//! - side windows of width `w` on each side of the core
//! - `snr = (peak - mean) / std`, side statistics averaged
//! - pass if `snr >= threshold` or `peak > 3 * threshold`
//!
//! When the local scatter cannot be measured (an empty side window, zero or
//! non-finite std) the line is given `snr = threshold`, so it passes.

use log::{debug, info};
use rayon::prelude::*;

use crate::domain::{FilteredLine, ResolvedLine, Spectrum};
use crate::math::{nan_mean, nan_std};
use crate::models::FWHM_PER_SIGMA;

/// Lower bound on the width parameter handed to the table.
pub const MIN_SIGMA_BOUND: f64 = 2.0;
/// Upper width bound as a multiple of the measured sigma.
pub const MAX_SIGMA_FACTOR: f64 = 1.5;
/// Half-width of the centroid box, in measured sigmas.
const CORE_SIGMAS: f64 = 2.0;

/// Keep significant lines in `range`, in input order.
pub fn filter_lines(
    resolved: &[ResolvedLine],
    masked: &Spectrum,
    range: (f64, f64),
    noise_threshold: f64,
    window_width: f64,
) -> Vec<FilteredLine> {
    let (min, max) = range;
    let kept: Vec<FilteredLine> = resolved
        .par_iter()
        .filter(|line| line.observed_wavelength >= min && line.observed_wavelength <= max)
        .filter_map(|line| assess(line, masked, noise_threshold, window_width))
        .collect();
    info!(
        "{} of {} lines pass significance (threshold {noise_threshold:.4})",
        kept.len(),
        resolved.len()
    );
    kept
}

fn assess(line: &ResolvedLine, masked: &Spectrum, threshold: f64, window_width: f64) -> Option<FilteredLine> {
    let sigma = line.fwhm / FWHM_PER_SIGMA;
    let min_loc = line.observed_wavelength - CORE_SIGMAS * sigma;
    let max_loc = line.observed_wavelength + CORE_SIGMAS * sigma;

    let flux = masked.flux();
    let left = &flux[masked.index_range(min_loc - window_width, min_loc)];
    let right = &flux[masked.index_range(max_loc, max_loc + window_width)];
    let snr = local_snr(line.peak_flux, left, right).unwrap_or(threshold);

    if snr >= threshold || line.peak_flux > 3.0 * threshold {
        Some(FilteredLine {
            name: line.name.clone(),
            observed_wavelength: line.observed_wavelength,
            fwhm: line.fwhm,
            sigma,
            min_loc,
            max_loc,
            min_sd: MIN_SIGMA_BOUND,
            max_sd: MAX_SIGMA_FACTOR * sigma,
            max_flux: line.peak_flux,
            snr,
        })
    } else {
        debug!("{} rejected: snr {snr:.3} below {threshold:.3}", line.name);
        None
    }
}

/// `None` when the local scatter is not measurable.
fn local_snr(peak: f64, left: &[f64], right: &[f64]) -> Option<f64> {
    let mean = (nan_mean(left)? + nan_mean(right)?) / 2.0;
    let std = (nan_std(left)? + nan_std(right)?) / 2.0;
    if !(std.is_finite() && std > 0.0) {
        return None;
    }
    Some((peak - mean) / std)
}
