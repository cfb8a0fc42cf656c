//! The `spl setup` workflow, shared by the CLI and by library callers.
//!
//! restrict -> detect + mask -> continuum fit -> significance filter -> table
//!
//! `setup` works on in-memory inputs with injectable noise and line shapes, so
//! it is fully testable; `run_setup` adds file loading on top.

use log::{info, warn};

use crate::detect::{Detection, GaussianNoise, NoiseSource, detect};
use crate::domain::{FilteredLine, LineCatalog, SetupConfig, Spectrum};
use crate::error::{AppError, PipelineError};
use crate::filter::filter_lines;
use crate::fit::{ContinuumParams, LmOptions, fit_continuum};
use crate::io::{IngestedSpectrum, load_catalog, load_spectrum};
use crate::models::{AnalyticProfiles, LineShapeProvider};
use crate::table::{ContinuumSeed, TableBuild, build_table};

/// Numeric knobs of a setup run.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub range: (f64, f64),
    pub gamma_init: f64,
    pub window_halfwidth: f64,
    pub snr_window: f64,
    pub fit_continuum: bool,
    /// `(min, max)` box the fitted continuum row is checked against.
    pub continuum_bounds: ([f64; 3], [f64; 3]),
    pub lm: LmOptions,
}

impl From<&SetupConfig> for SetupOptions {
    fn from(config: &SetupConfig) -> Self {
        Self {
            range: (config.wavelength_min, config.wavelength_max),
            gamma_init: config.gamma_init,
            window_halfwidth: config.window_halfwidth,
            snr_window: config.snr_window,
            fit_continuum: config.fit_continuum,
            continuum_bounds: config.continuum_bounds,
            lm: LmOptions::default(),
        }
    }
}

/// Everything a setup run computed.
#[derive(Debug, Clone)]
pub struct SetupOutput {
    /// The input spectrum restricted to the fitting range.
    pub spectrum: Spectrum,
    pub detection: Detection,
    pub continuum: Option<ContinuumParams>,
    pub filtered: Vec<FilteredLine>,
    pub build: TableBuild,
}

/// A setup run loaded from files.
#[derive(Debug, Clone)]
pub struct SetupRun {
    pub ingest: IngestedSpectrum,
    pub catalog: LineCatalog,
    pub output: SetupOutput,
}

pub fn setup(
    spectrum: &Spectrum,
    catalog: &LineCatalog,
    options: &SetupOptions,
    noise: &mut dyn NoiseSource,
    provider: &dyn LineShapeProvider,
) -> Result<SetupOutput, PipelineError> {
    let (min, max) = options.range;
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(PipelineError::InvalidInput(format!(
            "invalid wavelength range [{min}, {max}]"
        )));
    }

    let restricted = spectrum.restrict(min, max)?;
    info!(
        "fitting range [{min}, {max}] keeps {} of {} samples",
        restricted.len(),
        spectrum.len()
    );

    let detection = detect(&restricted, catalog, options.window_halfwidth, noise)?;

    let continuum = if options.fit_continuum {
        Some(fit_continuum(&detection.masked, options.gamma_init, provider, &options.lm)?)
    } else {
        None
    };

    let filtered = filter_lines(
        &detection.lines,
        &detection.masked,
        options.range,
        detection.noise_estimate,
        options.snr_window,
    );

    let seed = continuum.map(|c| ContinuumSeed {
        values: c.to_array(),
        bounds: Some(options.continuum_bounds),
    });
    let build = build_table(catalog, &filtered, seed);
    for issue in &build.issues {
        warn!("{}: {}", issue.line, issue.error);
    }

    Ok(SetupOutput {
        spectrum: restricted,
        detection,
        continuum,
        filtered,
        build,
    })
}

/// Load the inputs named in `config` and run `setup` with seeded noise.
pub fn run_setup(config: &SetupConfig) -> Result<SetupRun, AppError> {
    let ingest = load_spectrum(&config.spectrum_path)?;
    for e in &ingest.row_errors {
        warn!("spectrum line {}: {}", e.line, e.message);
    }
    let catalog = load_catalog(&config.catalog_path)?;
    info!(
        "loaded {} spectrum samples and {} catalog lines",
        ingest.rows_used,
        catalog.len()
    );

    let mut noise = GaussianNoise::seeded(config.seed);
    let output = setup(
        &ingest.spectrum,
        &catalog,
        &SetupOptions::from(config),
        &mut noise,
        &AnalyticProfiles,
    )?;

    Ok(SetupRun { ingest, catalog, output })
}
