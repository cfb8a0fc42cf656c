//! Fit results: the optimizer's outcome file and the per-component CSV export.
//!
//! The export has one row per line component, in table order, followed by two
//! summary rows (continuum parameters, goodness of fit). Widths are also given
//! as velocities, `w / λc · c`. Missing values are written as empty cells.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, ParameterTable};
use crate::error::AppError;
use crate::fit::Goodness;

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

pub const RESULT_COLUMNS: [&str; 15] = [
    "Line Name",
    "Model",
    "Component",
    "Centroid",
    "Amplitude",
    "Sigma / A factor",
    "Sigma (km/s)",
    "Gamma / w width",
    "Gamma (km/s)",
    "err_Centroid",
    "err_Amplitude",
    "err_Sigma / err_A",
    "err_Sigma (km/s)",
    "err_Gamma / err_w",
    "err_Gamma (km/s)",
];

/// What the external optimizer hands back: best-fit values and their errors,
/// positionally aligned with `ParameterTable::flatten`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    pub values: Vec<f64>,
    pub errors: Vec<Option<f64>>,
    pub goodness: Goodness,
}

pub fn read_fit_outcome(path: &Path) -> Result<FitOutcome, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit outcome '{}': {e}", path.display())))?;
    read_outcome(file)
}

pub fn read_outcome<R: Read>(input: R) -> Result<FitOutcome, AppError> {
    serde_json::from_reader(input).map_err(|e| AppError::new(2, format!("Invalid fit outcome JSON: {e}")))
}

/// Write the results CSV to a file.
pub fn write_results_csv(path: &Path, table: &ParameterTable, outcome: &FitOutcome) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_results(file, table, outcome)
}

pub fn write_results<W: Write>(out: W, table: &ParameterTable, outcome: &FitOutcome) -> Result<(), AppError> {
    let expected = table.parameter_count();
    if outcome.values.len() != expected || outcome.errors.len() != expected {
        return Err(AppError::new(
            2,
            format!(
                "Fit outcome has {} values and {} errors; the table has {expected} parameters.",
                outcome.values.len(),
                outcome.errors.len()
            ),
        ));
    }

    let mut writer = csv::Writer::from_writer(out);
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write export CSV: {e}"));
    writer.write_record(RESULT_COLUMNS).map_err(write_err)?;

    let mut continuum: Option<&[f64]> = None;
    let mut offset = 0;
    for row in table.rows() {
        let k = row.params().arity();
        let values = &outcome.values[offset..offset + k];
        let errors = &outcome.errors[offset..offset + k];
        offset += k;

        if row.is_continuum() {
            continuum = Some(values);
            continue;
        }
        writer
            .write_record(component_record(row.line(), row.kind(), row.component(), values, errors))
            .map_err(write_err)?;
    }

    let p = |i: usize| continuum.and_then(|c| c.get(i).copied());
    let mut record = summary_record("Continuum", "Continuum");
    record[3] = cell(p(0));
    record[4] = cell(p(1));
    record[5] = cell(p(2));
    writer.write_record(&record).map_err(write_err)?;

    let g = &outcome.goodness;
    let mut record = summary_record("Goodness", "Goodness of Fit");
    record[3] = cell(Some(g.chi_squared));
    record[4] = cell(Some(g.reduced_chi_squared));
    record[5] = cell(Some(g.bic));
    writer.write_record(&record).map_err(write_err)?;

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

fn component_record(
    line: &str,
    kind: ModelKind,
    component: u32,
    values: &[f64],
    errors: &[Option<f64>],
) -> Vec<String> {
    let centroid = values[0];
    let (sigma, gamma, err_sigma, err_gamma) = match kind {
        ModelKind::Lorentzian => (None, Some(values[2]), None, errors[2]),
        ModelKind::Voigt => (Some(values[2]), Some(values[3]), errors[2], errors[3]),
        _ => (Some(values[2]), None, errors[2], None),
    };
    let kms = |w: Option<f64>| w.map(|w| w / centroid * SPEED_OF_LIGHT_KMS);

    vec![
        line.to_string(),
        kind.name().to_string(),
        component.to_string(),
        cell(Some(centroid)),
        cell(Some(values[1])),
        cell(sigma),
        cell(kms(sigma)),
        cell(gamma),
        cell(kms(gamma)),
        cell(errors[0]),
        cell(errors[1]),
        cell(err_sigma),
        cell(kms(err_sigma)),
        cell(err_gamma),
        cell(kms(err_gamma)),
    ]
}

fn summary_record(line: &str, model: &str) -> Vec<String> {
    let mut record = vec![String::new(); RESULT_COLUMNS.len()];
    record[0] = line.to_string();
    record[1] = model.to_string();
    record
}

fn cell(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bounded, ParameterRow, RowParams};

    fn table() -> ParameterTable {
        let ha = Bounded::new([6563.0, 100.0, 4.0], [6555.0, 0.0, 2.0], [6571.0, 200.0, 6.0]).unwrap();
        let wing = Bounded::new([6563.0, 50.0, 4.0], [6555.0, 0.0, 2.0], [6571.0, 100.0, 7.0]).unwrap();
        let continuum = Bounded::new([1.0, 6500.0, 0.5], [0.0; 3], [f64::INFINITY; 3]).unwrap();
        let oiii = Bounded::new([5007.0, 40.0, 3.0, 2.0], [5000.0, 0.0, 2.0, 1.0], [5014.0, 80.0, 5.0, 5.0]).unwrap();
        ParameterTable::new(vec![
            ParameterRow::new("Ha", 1, RowParams::Gaussian(ha)).unwrap(),
            ParameterRow::new("Ha", 2, RowParams::Lorentzian(wing)).unwrap(),
            ParameterRow::continuum(continuum),
            ParameterRow::new("OIII", 1, RowParams::Voigt(oiii)).unwrap(),
        ])
        .unwrap()
    }

    fn outcome() -> FitOutcome {
        let values = vec![
            6563.0, 90.0, 4.2, 6563.5, 40.0, 5.0, 1.2, 6500.0, 0.4, 5007.0, 38.0, 3.1, 1.9,
        ];
        let mut errors: Vec<Option<f64>> = values.iter().map(|v| Some(v * 0.01)).collect();
        errors[4] = None;
        FitOutcome {
            values,
            errors,
            goodness: Goodness {
                chi_squared: 120.5,
                reduced_chi_squared: 1.05,
                bic: 180.25,
            },
        }
    }

    fn export() -> Vec<Vec<String>> {
        let mut buf = Vec::new();
        write_results(&mut buf, &table(), &outcome()).unwrap();
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(buf.as_slice());
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn one_row_per_component_plus_summaries() {
        let rows = export();
        assert_eq!(rows[0], RESULT_COLUMNS.to_vec());
        assert_eq!(rows.len(), 1 + 3 + 2);
        assert_eq!(rows[1][0..3], ["Ha", "Gaussian", "1"]);
        assert_eq!(rows[3][0..3], ["OIII", "Voigt", "1"]);
        assert_eq!(rows[4][0], "Continuum");
        assert_eq!(rows[5][0], "Goodness");
    }

    #[test]
    fn values_are_placed_by_model() {
        let rows = export();

        let ha = &rows[1];
        assert_eq!(ha[5], "4.2");
        let kms: f64 = ha[6].parse().unwrap();
        assert!((kms - 4.2 / 6563.0 * SPEED_OF_LIGHT_KMS).abs() < 1e-9);
        assert_eq!(ha[7], "");

        // Lorentzian width goes to the gamma column; a missing error stays empty.
        let wing = &rows[2];
        assert_eq!(wing[5], "");
        assert_eq!(wing[7], "5");
        assert_eq!(wing[10], "");

        // The continuum row sits between the lines, so OIII reads from offset 9.
        let oiii = &rows[3];
        assert_eq!(oiii[3], "5007");
        assert_eq!(oiii[7], "1.9");
    }

    #[test]
    fn summary_rows_hold_continuum_and_goodness() {
        let rows = export();
        assert_eq!(rows[4][3..6], ["1.2", "6500", "0.4"]);
        assert_eq!(rows[5][3..6], ["120.5", "1.05", "180.25"]);
        assert!(rows[5][6..].iter().all(String::is_empty));
    }

    #[test]
    fn mismatched_outcome_is_rejected() {
        let mut short = outcome();
        short.values.pop();
        let err = write_results(Vec::new(), &table(), &short).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn outcome_json_allows_missing_errors() {
        let json = r#"{"values": [1.0, 2.0], "errors": [0.1, null],
            "goodness": {"chi_squared": 1.0, "reduced_chi_squared": 0.5, "bic": 2.0}}"#;
        let outcome = read_outcome(json.as_bytes()).unwrap();
        assert_eq!(outcome.errors, vec![Some(0.1), None]);
    }
}
