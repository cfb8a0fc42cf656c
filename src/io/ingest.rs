//! Spectrum CSV ingest.
//!
//! Turns a three-column CSV (`wavelength, flux, flux_error`) into a validated,
//! wavelength-sorted `Spectrum`.
//!
//! - **Strict schema**: all three columns must be present (exit code 2)
//! - **Lenient values**: empty or unparseable flux / error cells become NaN,
//!   which every pipeline stage treats as missing
//! - **Row-level errors**: rows without a usable wavelength are skipped and
//!   reported

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Spectrum;
use crate::error::AppError;

const WAVELENGTH_COLUMNS: [&str; 3] = ["wavelength", "lambda", "wave"];
const FLUX_COLUMNS: [&str; 1] = ["flux"];
const ERROR_COLUMNS: [&str; 4] = ["flux_error", "error", "err", "sigma"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedSpectrum {
    pub spectrum: Spectrum,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a spectrum CSV file.
pub fn load_spectrum(path: &Path) -> Result<IngestedSpectrum, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open spectrum CSV '{}': {e}", path.display())))?;
    read_spectrum(file)
}

/// Parse spectrum CSV from any reader.
pub fn read_spectrum<R: Read>(input: R) -> Result<IngestedSpectrum, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let wavelength_idx = find_column(&header_map, &WAVELENGTH_COLUMNS)?;
    let flux_idx = find_column(&header_map, &FLUX_COLUMNS)?;
    let error_idx = find_column(&header_map, &ERROR_COLUMNS)?;

    let mut samples: Vec<(f64, f64, f64)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, and CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let Some(wavelength) = parse_f64(record.get(wavelength_idx)) else {
            row_errors.push(RowError {
                line,
                message: "Missing/invalid `wavelength` value.".to_string(),
            });
            continue;
        };
        let flux = parse_f64(record.get(flux_idx)).unwrap_or(f64::NAN);
        let error = parse_f64(record.get(error_idx)).unwrap_or(f64::NAN);
        samples.push((wavelength, flux, error));
    }

    let rows_used = samples.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid spectrum rows found."));
    }

    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (wavelength, (flux, flux_error)): (Vec<f64>, (Vec<f64>, Vec<f64>)) =
        samples.into_iter().map(|(w, f, e)| (w, (f, e))).unzip();
    let spectrum = Spectrum::new(wavelength, flux, flux_error)?;

    Ok(IngestedSpectrum {
        spectrum,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Result<usize, AppError> {
    names
        .iter()
        .find_map(|n| header_map.get(*n).copied())
        .ok_or_else(|| {
            let alternatives: Vec<String> = names.iter().map(|n| format!("`{n}`")).collect();
            AppError::new(2, format!("Missing required column: {}", alternatives.join(" / ")))
        })
}

/// Finite value of a cell, `None` when empty or unparseable.
fn parse_f64(s: Option<&str>) -> Option<f64> {
    let s = s.map(str::trim).filter(|s| !s.is_empty())?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_aliases_and_sorts_rows() {
        let csv = "\u{feff}Lambda,FLUX,err\n5002,1.5,0.1\n5000,1.0,0.1\n5001,2.0,0.2\n";
        let data = read_spectrum(csv.as_bytes()).unwrap();
        assert_eq!(data.spectrum.wavelength(), &[5000.0, 5001.0, 5002.0]);
        assert_eq!(data.spectrum.flux(), &[1.0, 2.0, 1.5]);
        assert_eq!(data.spectrum.flux_error(), &[0.1, 0.2, 0.1]);
        assert!(data.row_errors.is_empty());
    }

    #[test]
    fn bad_values_become_missing_and_bad_wavelengths_are_reported() {
        let csv = "wavelength,flux,flux_error\n5000,,0.1\n,1.0,0.1\n5001,2.0,nan\n5002,abc,0.1\n";
        let data = read_spectrum(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 3);

        let flux = data.spectrum.flux();
        assert!(flux[0].is_nan());
        assert_eq!(flux[1], 2.0);
        assert!(flux[2].is_nan());
        assert!(data.spectrum.flux_error()[1].is_nan());
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let err = read_spectrum("wavelength,flux\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_data_is_an_error() {
        let err = read_spectrum("wavelength,flux,err\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
