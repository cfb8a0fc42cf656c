//! Continuum fit on the line-masked spectrum.
//!
//! The initial guess is `[mean(flux), min(wavelength), shape_hint]`; the solver
//! is `levenberg_marquardt` over the provider's continuum function. There is no
//! retry policy: a failed fit surfaces as `FitDivergence`.

use log::{debug, info};

use crate::domain::Spectrum;
use crate::error::PipelineError;
use crate::fit::lm::{LmOptions, levenberg_marquardt};
use crate::math::{nan_mean, nan_min};
use crate::models::LineShapeProvider;

/// Fitted continuum `[amplitude, location, shape]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuumParams {
    pub amplitude: f64,
    pub location: f64,
    pub shape: f64,
}

impl ContinuumParams {
    pub fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.location, self.shape]
    }
}

pub fn fit_continuum(
    masked: &Spectrum,
    shape_hint: f64,
    provider: &dyn LineShapeProvider,
    opts: &LmOptions,
) -> Result<ContinuumParams, PipelineError> {
    let (x, y): (Vec<f64>, Vec<f64>) = masked
        .wavelength()
        .iter()
        .zip(masked.flux())
        .filter(|(_, f)| f.is_finite())
        .map(|(&w, &f)| (w, f))
        .unzip();

    let amplitude = nan_mean(&y).ok_or_else(|| PipelineError::FitDivergence {
        iterations: 0,
        reason: "no finite flux to fit the continuum to".to_string(),
    })?;
    // `x` is non-empty here because `y` had a finite value.
    let location = nan_min(&x).unwrap_or(masked.wavelength()[0]);
    let p0 = [amplitude, location, shape_hint];
    debug!("continuum initial guess: {p0:?}");

    let model = |x: &[f64], p: &[f64]| provider.continuum(x, p[0], p[1], p[2]);
    let fit = levenberg_marquardt(model, &x, &y, &p0, opts)?;

    info!(
        "continuum fit converged in {} iterations (cost {:.4e})",
        fit.iterations, fit.cost
    );
    Ok(ContinuumParams {
        amplitude: fit.params[0],
        location: fit.params[1],
        shape: fit.params[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalyticProfiles, power_law};

    #[test]
    fn fits_power_law_continuum_with_missing_samples() {
        let wl: Vec<f64> = (0..300).map(|i| 4800.0 + i as f64).collect();
        let mut flux: Vec<f64> = wl.iter().map(|&w| power_law(w, 12.0, 4800.0, -2.0)).collect();
        flux[10] = f64::NAN;
        flux[200] = f64::NAN;
        let spectrum = Spectrum::from_flux(wl.clone(), flux).unwrap();

        let fit = fit_continuum(&spectrum, -1.0, &AnalyticProfiles, &LmOptions::default()).unwrap();
        for &w in &[4800.0, 4950.0, 5099.0] {
            let got = power_law(w, fit.amplitude, fit.location, fit.shape);
            let want = power_law(w, 12.0, 4800.0, -2.0);
            assert!((got - want).abs() < 1e-3, "at {w}: {got} vs {want}");
        }
    }

    #[test]
    fn all_missing_flux_is_a_divergence() {
        let spectrum = Spectrum::from_flux(vec![1.0, 2.0, 3.0, 4.0], vec![f64::NAN; 4]).unwrap();
        let err = fit_continuum(&spectrum, 0.0, &AnalyticProfiles, &LmOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::FitDivergence { .. }));
    }

    #[test]
    fn iteration_budget_exhaustion_propagates() {
        let wl: Vec<f64> = (0..50).map(|i| 1000.0 + i as f64 * 10.0).collect();
        let flux: Vec<f64> = wl.iter().map(|&w| power_law(w, 3.0, 1000.0, 1.7)).collect();
        let spectrum = Spectrum::from_flux(wl, flux).unwrap();
        let opts = LmOptions {
            max_iterations: 0,
            ..LmOptions::default()
        };
        let err = fit_continuum(&spectrum, 0.0, &AnalyticProfiles, &opts).unwrap_err();
        assert!(matches!(err, PipelineError::FitDivergence { iterations: 0, .. }));
    }
}
