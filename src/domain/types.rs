//! Shared domain types.
//!
//! These types flow between the pipeline stages:
//!
//! - inputs (`Spectrum`, `LineCatalog`)
//! - per-line stage outputs (`DetectedLine` → `ResolvedLine` → `FilteredLine`)
//! - model identifiers (`LineProfile`, `ModelKind`)
//! - the run configuration (`SetupConfig`)

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A 1-D spectrum stored column-wise and sorted by wavelength.
///
/// Flux and flux error may hold NaN for missing samples; every stage treats
/// those as absent rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    flux_error: Vec<f64>,
}

impl Spectrum {
    pub fn new(wavelength: Vec<f64>, flux: Vec<f64>, flux_error: Vec<f64>) -> Result<Self, PipelineError> {
        if wavelength.is_empty() {
            return Err(PipelineError::InvalidInput("spectrum has no samples".to_string()));
        }
        if flux.len() != wavelength.len() || flux_error.len() != wavelength.len() {
            return Err(PipelineError::InvalidInput(format!(
                "column length mismatch: wavelength={}, flux={}, flux_error={}",
                wavelength.len(),
                flux.len(),
                flux_error.len()
            )));
        }
        if wavelength.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::InvalidInput("non-finite wavelength".to_string()));
        }
        if wavelength.windows(2).any(|w| w[1] < w[0]) {
            return Err(PipelineError::InvalidInput(
                "wavelengths must be sorted in ascending order".to_string(),
            ));
        }
        Ok(Self {
            wavelength,
            flux,
            flux_error,
        })
    }

    /// Spectrum with unit errors; convenient for synthetic data.
    pub fn from_flux(wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, PipelineError> {
        let flux_error = vec![1.0; wavelength.len()];
        Self::new(wavelength, flux, flux_error)
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn flux_error(&self) -> &[f64] {
        &self.flux_error
    }

    /// Copy of this spectrum with the flux column replaced.
    pub fn with_flux(&self, flux: Vec<f64>) -> Result<Self, PipelineError> {
        Self::new(self.wavelength.clone(), flux, self.flux_error.clone())
    }

    /// Keep only samples with `min <= wavelength <= max`.
    pub fn restrict(&self, min: f64, max: f64) -> Result<Self, PipelineError> {
        let idx: Vec<usize> = self
            .wavelength
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w >= min && w <= max)
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "no spectrum samples within [{min}, {max}]"
            )));
        }
        Self::new(
            idx.iter().map(|&i| self.wavelength[i]).collect(),
            idx.iter().map(|&i| self.flux[i]).collect(),
            idx.iter().map(|&i| self.flux_error[i]).collect(),
        )
    }

    /// Indices of samples with `lo <= wavelength <= hi`, as a contiguous range.
    pub fn index_range(&self, lo: f64, hi: f64) -> std::ops::Range<usize> {
        let start = self.wavelength.partition_point(|&w| w < lo);
        let end = self.wavelength.partition_point(|&w| w <= hi);
        start..end.max(start)
    }
}

/// Line profile a catalog entry is modelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineProfile {
    Gaussian,
    Lorentzian,
    Voigt,
}

impl LineProfile {
    /// Number of free parameters of a single component.
    pub const fn arity(self) -> usize {
        match self {
            LineProfile::Gaussian | LineProfile::Lorentzian => 3,
            LineProfile::Voigt => 4,
        }
    }
}

impl From<LineProfile> for ModelKind {
    fn from(value: LineProfile) -> Self {
        match value {
            LineProfile::Gaussian => ModelKind::Gaussian,
            LineProfile::Lorentzian => ModelKind::Lorentzian,
            LineProfile::Voigt => ModelKind::Voigt,
        }
    }
}

/// Any model a parameter-table row can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Gaussian,
    Lorentzian,
    Voigt,
    Continuum,
}

impl ModelKind {
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Gaussian => "Gaussian",
            ModelKind::Lorentzian => "Lorentzian",
            ModelKind::Voigt => "Voigt",
            ModelKind::Continuum => "Continuum",
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            ModelKind::Gaussian | ModelKind::Lorentzian | ModelKind::Continuum => 3,
            ModelKind::Voigt => 4,
        }
    }

    /// The line profile, or `None` for the continuum.
    pub fn profile(self) -> Option<LineProfile> {
        match self {
            ModelKind::Gaussian => Some(LineProfile::Gaussian),
            ModelKind::Lorentzian => Some(LineProfile::Lorentzian),
            ModelKind::Voigt => Some(LineProfile::Voigt),
            ModelKind::Continuum => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(ModelKind::Gaussian),
            "lorentzian" => Ok(ModelKind::Lorentzian),
            "voigt" => Ok(ModelKind::Voigt),
            "continuum" => Ok(ModelKind::Continuum),
            _ => Err(PipelineError::UnknownModelKind(s.to_string())),
        }
    }
}

impl FromStr for LineProfile {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<ModelKind>()?
            .profile()
            .ok_or_else(|| PipelineError::UnknownModelKind(s.to_string()))
    }
}

/// One expected emission line.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogLine {
    pub name: String,
    pub rest_wavelength: Option<f64>,
    pub profile: LineProfile,
}

/// Expected lines, in processing order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineCatalog {
    lines: Vec<CatalogLine>,
}

impl LineCatalog {
    pub fn new(lines: Vec<CatalogLine>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(line.name.as_str()) {
                return Err(PipelineError::InvalidInput(format!(
                    "duplicate catalog line `{}`",
                    line.name
                )));
            }
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CatalogLine] {
        &self.lines
    }

    pub fn get(&self, name: &str) -> Option<&CatalogLine> {
        self.lines.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A catalog line matched to a local maximum of the spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLine {
    pub name: String,
    pub rest_wavelength: f64,
    pub observed_wavelength: f64,
    /// Index of the peak sample in the full spectrum.
    pub peak_index: usize,
    pub peak_flux: f64,
}

/// A detected line with its measured width.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub name: String,
    pub rest_wavelength: f64,
    pub observed_wavelength: f64,
    pub peak_index: usize,
    pub peak_flux: f64,
    pub fwhm: f64,
}

impl ResolvedLine {
    pub fn from_detected(line: DetectedLine, fwhm: f64) -> Self {
        Self {
            name: line.name,
            rest_wavelength: line.rest_wavelength,
            observed_wavelength: line.observed_wavelength,
            peak_index: line.peak_index,
            peak_flux: line.peak_flux,
            fwhm,
        }
    }
}

/// A line that passed significance filtering, with bound hints for the table.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredLine {
    pub name: String,
    pub observed_wavelength: f64,
    pub fwhm: f64,
    pub sigma: f64,
    pub min_loc: f64,
    pub max_loc: f64,
    pub min_sd: f64,
    pub max_sd: f64,
    pub max_flux: f64,
    pub snr: f64,
}

/// Why a catalog line produced no detection.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoRestWavelength,
    CoverageGap,
    NoSignificantPeak,
    DegenerateWidth,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoRestWavelength => "no rest wavelength",
            SkipReason::CoverageGap => "no samples in window",
            SkipReason::NoSignificantPeak => "no prominent maximum",
            SkipReason::DegenerateWidth => "degenerate peak width",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub name: String,
    pub reason: SkipReason,
}

/// A full `spl setup` run configuration.
///
/// This is derived from CLI flags (plus defaults and `.env`).
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub spectrum_path: PathBuf,
    pub catalog_path: PathBuf,
    pub wavelength_min: f64,
    pub wavelength_max: f64,
    /// Initial continuum shape (power-law index).
    pub gamma_init: f64,
    /// Half-width of the detection window around each rest wavelength.
    pub window_halfwidth: f64,
    /// Width of each side window used for the local SNR.
    pub snr_window: f64,
    /// Seed for the masking noise.
    pub seed: u64,
    pub fit_continuum: bool,
    /// `(min, max)` box for the fitted continuum row.
    pub continuum_bounds: ([f64; 3], [f64; 3]),
    pub out: Option<PathBuf>,
}

pub const DEFAULT_WINDOW_HALFWIDTH: f64 = 20.0;
pub const DEFAULT_SNR_WINDOW: f64 = 10.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_rejects_unsorted_wavelengths() {
        let err = Spectrum::from_flux(vec![2.0, 1.0], vec![0.0, 0.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn spectrum_tolerates_missing_flux() {
        let s = Spectrum::from_flux(vec![1.0, 2.0, 3.0], vec![f64::NAN, 1.0, f64::NAN]).unwrap();
        assert_eq!(s.len(), 3);
        assert!(s.flux()[0].is_nan());
    }

    #[test]
    fn restrict_and_index_range_are_inclusive() {
        let s = Spectrum::from_flux((0..10).map(f64::from).collect(), vec![0.0; 10]).unwrap();
        let r = s.restrict(2.0, 5.0).unwrap();
        assert_eq!(r.wavelength(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.index_range(2.0, 5.0), 2..6);
        assert_eq!(s.index_range(20.0, 30.0).len(), 0);
        assert!(s.restrict(20.0, 30.0).is_err());
    }

    #[test]
    fn model_kind_parsing_reports_unknown_names() {
        assert_eq!("voigt".parse::<ModelKind>().unwrap(), ModelKind::Voigt);
        assert_eq!(
            "Sersic".parse::<ModelKind>().unwrap_err(),
            PipelineError::UnknownModelKind("Sersic".to_string())
        );
        assert!("Continuum".parse::<LineProfile>().is_err());
    }

    #[test]
    fn catalog_rejects_duplicate_names() {
        let line = CatalogLine {
            name: "Ha".to_string(),
            rest_wavelength: Some(6563.0),
            profile: LineProfile::Gaussian,
        };
        assert!(LineCatalog::new(vec![line.clone(), line]).is_err());
    }
}
