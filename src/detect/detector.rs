//! Catalog-driven line detection.
//!
//! For every catalog line with a rest wavelength we look at a fixed window
//! around it, take the prominent local maximum closest to the rest wavelength,
//! and measure its FWHM on the full spectrum. The detected lines are then
//! masked out to produce the continuum-only spectrum used downstream.

use log::{debug, info};
use rayon::prelude::*;

use crate::detect::mask::{NoiseSource, synthesize};
use crate::detect::peaks::{find_peaks, peak_width};
use crate::domain::{CatalogLine, DetectedLine, LineCatalog, ResolvedLine, SkipReason, SkippedLine, Spectrum};
use crate::error::PipelineError;
use crate::math::interp_index;

/// Minimum prominence (flux units) for a maximum to count as a line.
pub const MIN_PROMINENCE: f64 = 0.5;

/// Relative height at which line widths are measured.
const HALF_HEIGHT: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Detection {
    /// Detected lines with measured widths, in catalog order.
    pub lines: Vec<ResolvedLine>,
    /// Standard deviation of the masked flux.
    pub noise_estimate: f64,
    /// The input spectrum with every line window replaced by fill noise.
    pub masked: Spectrum,
    /// `true` for samples outside every line window.
    pub mask: Vec<bool>,
    pub skipped: Vec<SkippedLine>,
}

pub fn detect(
    spectrum: &Spectrum,
    catalog: &LineCatalog,
    window_halfwidth: f64,
    noise: &mut dyn NoiseSource,
) -> Result<Detection, PipelineError> {
    if !(window_halfwidth.is_finite() && window_halfwidth > 0.0) {
        return Err(PipelineError::InvalidInput(format!(
            "detection window half-width must be positive, got {window_halfwidth}"
        )));
    }

    let outcomes: Vec<Result<ResolvedLine, SkippedLine>> = catalog
        .lines()
        .par_iter()
        .map(|line| resolve_line(spectrum, line, window_halfwidth))
        .collect();

    let mut lines = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(line) => lines.push(line),
            Err(skip) => {
                debug!("skipping {}: {}", skip.name, skip.reason.label());
                skipped.push(skip);
            }
        }
    }
    info!(
        "detected {} of {} catalog lines ({} skipped)",
        lines.len(),
        catalog.len(),
        skipped.len()
    );

    let synthesis = synthesize(spectrum, &lines, noise);
    let masked = spectrum.with_flux(synthesis.flux)?;
    info!("continuum noise estimate {:.4}", synthesis.noise_estimate);

    Ok(Detection {
        lines,
        noise_estimate: synthesis.noise_estimate,
        masked,
        mask: synthesis.continuum_mask,
        skipped,
    })
}

fn resolve_line(spectrum: &Spectrum, line: &CatalogLine, window_halfwidth: f64) -> Result<ResolvedLine, SkippedLine> {
    let detected = find_line(spectrum, line, window_halfwidth)?;
    let fwhm = measure_fwhm(spectrum, detected.peak_index).ok_or_else(|| skip(line, SkipReason::DegenerateWidth))?;
    Ok(ResolvedLine::from_detected(detected, fwhm))
}

/// The prominent maximum closest to the rest wavelength.
fn find_line(spectrum: &Spectrum, line: &CatalogLine, window_halfwidth: f64) -> Result<DetectedLine, SkippedLine> {
    let rest = line
        .rest_wavelength
        .ok_or_else(|| skip(line, SkipReason::NoRestWavelength))?;

    let range = spectrum.index_range(rest - window_halfwidth, rest + window_halfwidth);
    if range.is_empty() {
        return Err(skip(line, SkipReason::CoverageGap));
    }
    let wavelength = &spectrum.wavelength()[range.clone()];
    let flux = &spectrum.flux()[range.clone()];

    let mut best: Option<(usize, f64)> = None;
    for peak in find_peaks(flux, MIN_PROMINENCE) {
        let diff = (wavelength[peak] - rest).abs();
        if best.is_none_or(|(_, d)| diff < d) {
            best = Some((peak, diff));
        }
    }
    let (local, _) = best.ok_or_else(|| skip(line, SkipReason::NoSignificantPeak))?;

    Ok(DetectedLine {
        name: line.name.clone(),
        rest_wavelength: rest,
        observed_wavelength: wavelength[local],
        peak_index: range.start + local,
        peak_flux: flux[local],
    })
}

/// FWHM in wavelength units, measured at half prominence on the full flux.
fn measure_fwhm(spectrum: &Spectrum, peak_index: usize) -> Option<f64> {
    let crossing = peak_width(spectrum.flux(), peak_index, HALF_HEIGHT)?;
    let grid = spectrum.wavelength();
    let fwhm = interp_index(crossing.right, grid) - interp_index(crossing.left, grid);
    (fwhm.is_finite() && fwhm > 0.0).then_some(fwhm)
}

fn skip(line: &CatalogLine, reason: SkipReason) -> SkippedLine {
    SkippedLine {
        name: line.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::StandardNormal;

    use super::*;
    use crate::detect::mask::{GaussianNoise, ZeroNoise};
    use crate::domain::LineProfile;
    use crate::models::gaussian;

    fn catalog(entries: &[(&str, Option<f64>)]) -> LineCatalog {
        LineCatalog::new(
            entries
                .iter()
                .map(|&(name, rest)| CatalogLine {
                    name: name.to_string(),
                    rest_wavelength: rest,
                    profile: LineProfile::Gaussian,
                })
                .collect(),
        )
        .unwrap()
    }

    fn oiii_spectrum() -> Spectrum {
        let mut rng = StdRng::seed_from_u64(11);
        let wl: Vec<f64> = (0..=200).map(|i| 4900.0 + i as f64).collect();
        let flux: Vec<f64> = wl
            .iter()
            .map(|&w| {
                let z: f64 = rng.sample(StandardNormal);
                gaussian(w, 5007.0, 50.0, 3.0) + z
            })
            .collect();
        Spectrum::from_flux(wl, flux).unwrap()
    }

    #[test]
    fn recovers_oiii_position_and_width() {
        let spectrum = oiii_spectrum();
        let detection = detect(
            &spectrum,
            &catalog(&[("OIII_5007", Some(5007.0))]),
            20.0,
            &mut GaussianNoise::seeded(42),
        )
        .unwrap();

        assert_eq!(detection.lines.len(), 1);
        let line = &detection.lines[0];
        assert!((line.observed_wavelength - 5007.0).abs() <= 1.5);
        let expected = 2.354_820_045 * 3.0;
        assert!(
            (line.fwhm - expected).abs() < 0.1 * expected,
            "fwhm {} vs {expected}",
            line.fwhm
        );
        assert!(!detection.mask[line.peak_index]);
        assert_eq!(detection.masked.len(), spectrum.len());
    }

    #[test]
    fn line_outside_coverage_is_skipped() {
        let spectrum = oiii_spectrum();
        let detection = detect(&spectrum, &catalog(&[("Ha", Some(6563.0))]), 20.0, &mut ZeroNoise).unwrap();
        assert!(detection.lines.is_empty());
        assert_eq!(detection.skipped[0].reason, SkipReason::CoverageGap);
        assert!(detection.mask.iter().all(|&m| m));
        assert_eq!(detection.masked.flux(), spectrum.flux());
    }

    #[test]
    fn lines_without_rest_wavelength_or_peak_are_skipped() {
        let wl: Vec<f64> = (0..100).map(|i| 5000.0 + i as f64).collect();
        let spectrum = Spectrum::from_flux(wl, vec![1.0; 100]).unwrap();
        let detection = detect(
            &spectrum,
            &catalog(&[("unknown", None), ("flat", Some(5050.0))]),
            20.0,
            &mut ZeroNoise,
        )
        .unwrap();

        let reasons: Vec<_> = detection.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(reasons, vec![SkipReason::NoRestWavelength, SkipReason::NoSignificantPeak]);
    }

    #[test]
    fn picks_the_maximum_closest_to_rest() {
        let wl: Vec<f64> = (0..=80).map(|i| 4980.0 + i as f64 * 0.5).collect();
        let flux: Vec<f64> = wl
            .iter()
            .map(|&w| gaussian(w, 4995.0, 30.0, 1.5) + gaussian(w, 5008.0, 10.0, 1.5))
            .collect();
        let spectrum = Spectrum::from_flux(wl, flux).unwrap();
        let detection = detect(&spectrum, &catalog(&[("x", Some(5006.0))]), 20.0, &mut ZeroNoise).unwrap();
        assert!((detection.lines[0].observed_wavelength - 5008.0).abs() < 1e-9);
    }

    #[test]
    fn results_follow_catalog_order() {
        let wl: Vec<f64> = (0..400).map(|i| 4800.0 + i as f64).collect();
        let flux: Vec<f64> = wl
            .iter()
            .map(|&w| gaussian(w, 4861.0, 20.0, 2.0) + gaussian(w, 5007.0, 40.0, 2.0))
            .collect();
        let spectrum = Spectrum::from_flux(wl, flux).unwrap();
        let detection = detect(
            &spectrum,
            &catalog(&[("OIII", Some(5007.0)), ("Hb", Some(4861.0))]),
            20.0,
            &mut ZeroNoise,
        )
        .unwrap();
        let names: Vec<_> = detection.lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["OIII", "Hb"]);
    }
}
