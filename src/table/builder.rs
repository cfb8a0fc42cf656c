//! Initial parameter table from the filtered line list.
//!
//! Each significant line gets one component seeded from its detection:
//!
//! | model      | value               | min                            | max                                  |
//! |------------|---------------------|--------------------------------|--------------------------------------|
//! | Gaussian   | `[λ, f, σ]`         | `[loc_lo, 0, sd_lo]`           | `[loc_hi, f, sd_hi]`                 |
//! | Lorentzian | `[λ, f, 1.11σ]`     | `[loc_lo, 0, 1.11 sd_lo]`      | `[loc_hi, f, 1.11 sd_hi]`            |
//! | Voigt      | `[λ, f, σ, 1.11σ]`  | `[loc_lo, 0, sd_lo, 1.11 sd_lo]` | `[loc_hi, f, sd_hi, 1.11 sd_hi]`   |
//!
//! The continuum row, if any, goes last.

use log::{info, warn};

use crate::domain::{
    Bounded, CONTINUUM_LINE, FilteredLine, LineCatalog, LineProfile, ParameterRow, ParameterTable, RowIssue,
    RowParams,
};
use crate::error::PipelineError;
use crate::table::LORENTZ_WIDTH_FACTOR;

/// Fitted continuum parameters, optionally with a custom bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuumSeed {
    pub values: [f64; 3],
    /// `(min, max)`; defaults to `[0, ∞)` for every parameter.
    pub bounds: Option<([f64; 3], [f64; 3])>,
}

impl ContinuumSeed {
    pub fn new(values: [f64; 3]) -> Self {
        Self { values, bounds: None }
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        self.bounds.unwrap_or(([0.0; 3], [f64::INFINITY; 3]))
    }
}

/// A table plus the rows that could not be built.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBuild {
    pub table: ParameterTable,
    pub issues: Vec<RowIssue>,
}

pub fn build_table(catalog: &LineCatalog, filtered: &[FilteredLine], continuum: Option<ContinuumSeed>) -> TableBuild {
    let mut rows = Vec::with_capacity(filtered.len() + 1);
    let mut issues = Vec::new();

    for line in filtered {
        match line_row(catalog, line) {
            Ok(row) => rows.push(row),
            Err(error) => {
                warn!("{}: {error}", line.name);
                issues.push(RowIssue {
                    line: line.name.clone(),
                    component: Some(1),
                    error,
                });
            }
        }
    }

    if let Some(seed) = continuum {
        let (min, max) = seed.bounds();
        match Bounded::new(seed.values, min, max) {
            Ok(params) => rows.push(ParameterRow::continuum(params)),
            Err(oob) => {
                let error = oob.at(CONTINUUM_LINE, 0);
                warn!("continuum: {error}");
                issues.push(RowIssue {
                    line: CONTINUUM_LINE.to_string(),
                    component: Some(0),
                    error,
                });
            }
        }
    }

    info!("built table with {} rows ({} issues)", rows.len(), issues.len());
    TableBuild {
        table: ParameterTable::from_rows_unchecked(rows),
        issues,
    }
}

fn line_row(catalog: &LineCatalog, line: &FilteredLine) -> Result<ParameterRow, PipelineError> {
    let entry = catalog
        .get(&line.name)
        .ok_or_else(|| PipelineError::LineNotFound(line.name.clone()))?;

    let (center, flux, sigma) = (line.observed_wavelength, line.max_flux, line.sigma);
    let (loc_lo, loc_hi) = (line.min_loc, line.max_loc);
    let (sd_lo, sd_hi) = (line.min_sd, line.max_sd);
    let l = LORENTZ_WIDTH_FACTOR;

    let params = match entry.profile {
        LineProfile::Gaussian => Bounded::new([center, flux, sigma], [loc_lo, 0.0, sd_lo], [loc_hi, flux, sd_hi])
            .map(RowParams::Gaussian),
        LineProfile::Lorentzian => Bounded::new(
            [center, flux, l * sigma],
            [loc_lo, 0.0, l * sd_lo],
            [loc_hi, flux, l * sd_hi],
        )
        .map(RowParams::Lorentzian),
        LineProfile::Voigt => Bounded::new(
            [center, flux, sigma, l * sigma],
            [loc_lo, 0.0, sd_lo, l * sd_lo],
            [loc_hi, flux, sd_hi, l * sd_hi],
        )
        .map(RowParams::Voigt),
    }
    .map_err(|oob| oob.at(&line.name, 1))?;

    ParameterRow::new(line.name.clone(), 1, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogLine, ModelKind};

    fn catalog() -> LineCatalog {
        LineCatalog::new(vec![
            CatalogLine {
                name: "Hb".to_string(),
                rest_wavelength: Some(4861.0),
                profile: LineProfile::Gaussian,
            },
            CatalogLine {
                name: "OIII".to_string(),
                rest_wavelength: Some(5007.0),
                profile: LineProfile::Voigt,
            },
            CatalogLine {
                name: "HeI".to_string(),
                rest_wavelength: Some(5876.0),
                profile: LineProfile::Lorentzian,
            },
        ])
        .unwrap()
    }

    fn filtered(name: &str, observed: f64, sigma: f64, flux: f64) -> FilteredLine {
        FilteredLine {
            name: name.to_string(),
            observed_wavelength: observed,
            fwhm: 2.3548 * sigma,
            sigma,
            min_loc: observed - 2.0 * sigma,
            max_loc: observed + 2.0 * sigma,
            min_sd: 2.0,
            max_sd: 1.5 * sigma,
            max_flux: flux,
            snr: 10.0,
        }
    }

    #[test]
    fn one_row_per_filtered_line_plus_continuum() {
        let lines = [
            filtered("Hb", 4861.0, 3.0, 20.0),
            filtered("OIII", 5007.0, 3.0, 50.0),
            filtered("HeI", 5876.0, 3.0, 5.0),
        ];
        let build = build_table(&catalog(), &lines, Some(ContinuumSeed::new([1.0, 4800.0, 0.5])));
        assert!(build.issues.is_empty());
        assert_eq!(build.table.len(), 4);

        let kinds: Vec<_> = build.table.rows().iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![ModelKind::Gaussian, ModelKind::Voigt, ModelKind::Lorentzian, ModelKind::Continuum]
        );
        assert_eq!(build.table.rows()[1].values(), &[5007.0, 50.0, 3.0, 1.11 * 3.0]);
        assert!(build.table.rows()[3].is_continuum());
    }

    #[test]
    fn every_row_respects_its_bounds() {
        let lines = [filtered("Hb", 4861.0, 2.5, 20.0), filtered("HeI", 5876.0, 4.0, 5.0)];
        let build = build_table(&catalog(), &lines, Some(ContinuumSeed::new([1.0, 4800.0, 0.5])));
        let flat = build.table.flatten();
        for ((v, lo), hi) in flat.values.iter().zip(&flat.min).zip(&flat.max) {
            assert!(lo <= v && v <= hi, "{lo} <= {v} <= {hi}");
        }
    }

    #[test]
    fn failing_rows_are_reported_not_fatal() {
        let lines = [
            filtered("Unknown", 6000.0, 3.0, 5.0),
            // sigma below the fixed width floor of 2.0
            filtered("Hb", 4861.0, 1.0, 20.0),
            filtered("OIII", 5007.0, 3.0, 50.0),
        ];
        let build = build_table(&catalog(), &lines, None);
        assert_eq!(build.table.len(), 1);
        assert_eq!(build.table.rows()[0].line(), "OIII");
        assert!(matches!(build.issues[0].error, PipelineError::LineNotFound(_)));
        assert!(matches!(build.issues[1].error, PipelineError::BoundsViolation { index: 2, .. }));
    }

    #[test]
    fn continuum_only_table() {
        let build = build_table(&catalog(), &[], Some(ContinuumSeed::new([2.0, 4000.0, 1.0])));
        assert_eq!(build.table.len(), 1);
        assert!(build.table.rows()[0].is_continuum());
        assert_eq!(build.table.parameter_count(), 3);
    }

    #[test]
    fn continuum_outside_default_box_is_reported() {
        let build = build_table(&catalog(), &[], Some(ContinuumSeed::new([2.0, 4000.0, -1.0])));
        assert!(build.table.is_empty());
        assert_eq!(build.issues[0].component, Some(0));

        let seed = ContinuumSeed {
            values: [2.0, 4000.0, -1.0],
            bounds: Some(([0.0, 0.0, -5.0], [10.0, 1e4, 5.0])),
        };
        assert_eq!(build_table(&catalog(), &[], Some(seed)).table.len(), 1);
    }
}
