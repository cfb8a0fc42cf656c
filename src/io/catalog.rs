//! Line catalog JSON.
//!
//! ```json
//! [
//!   {"name": "Halpha", "wavelength": 6562.8, "model": "Gaussian"},
//!   {"name": "OIII_5007", "wavelength": [5006.8], "model": "Voigt"},
//!   {"name": "Unknown", "wavelength": null, "model": "Lorentzian"}
//! ]
//! ```
//!
//! `wavelength` may be a number, a one-element list, or null.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{CatalogLine, LineCatalog, LineProfile};
use crate::error::{AppError, PipelineError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WavelengthField {
    Single(f64),
    List(Vec<f64>),
}

impl WavelengthField {
    fn first(&self) -> Option<f64> {
        match self {
            WavelengthField::Single(w) => Some(*w),
            WavelengthField::List(ws) => ws.first().copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    #[serde(default)]
    pub wavelength: Option<WavelengthField>,
    #[serde(alias = "components")]
    pub model: String,
}

impl CatalogRecord {
    fn into_line(self) -> Result<CatalogLine, PipelineError> {
        let profile: LineProfile = self.model.parse()?;
        let rest_wavelength = self.wavelength.as_ref().and_then(WavelengthField::first);
        if let Some(w) = rest_wavelength {
            if !(w.is_finite() && w > 0.0) {
                return Err(PipelineError::InvalidInput(format!(
                    "line `{}` has an invalid rest wavelength {w}",
                    self.name
                )));
            }
        }
        Ok(CatalogLine {
            name: self.name,
            rest_wavelength,
            profile,
        })
    }
}

pub fn catalog_from_records(records: Vec<CatalogRecord>) -> Result<LineCatalog, PipelineError> {
    let lines = records
        .into_iter()
        .map(CatalogRecord::into_line)
        .collect::<Result<Vec<_>, _>>()?;
    LineCatalog::new(lines)
}

pub fn load_catalog(path: &Path) -> Result<LineCatalog, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open catalog JSON '{}': {e}", path.display())))?;
    read_catalog(file)
}

pub fn read_catalog<R: Read>(input: R) -> Result<LineCatalog, AppError> {
    let records: Vec<CatalogRecord> =
        serde_json::from_reader(input).map_err(|e| AppError::new(2, format!("Invalid catalog JSON: {e}")))?;
    Ok(catalog_from_records(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_wavelength_shape() {
        let json = r#"[
            {"name": "Ha", "wavelength": 6562.8, "model": "Gaussian"},
            {"name": "OIII", "wavelength": [5006.8], "model": "voigt"},
            {"name": "X", "wavelength": null, "components": "Lorentzian"},
            {"name": "Y", "model": "Gaussian"}
        ]"#;
        let catalog = read_catalog(json.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.lines()[0].rest_wavelength, Some(6562.8));
        assert_eq!(catalog.lines()[1].rest_wavelength, Some(5006.8));
        assert_eq!(catalog.lines()[1].profile, LineProfile::Voigt);
        assert_eq!(catalog.lines()[2].rest_wavelength, None);
        assert_eq!(catalog.lines()[3].rest_wavelength, None);
    }

    #[test]
    fn unknown_models_are_rejected() {
        let json = r#"[{"name": "Ha", "wavelength": 6562.8, "model": "Sersic"}]"#;
        let err = read_catalog(json.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "unknown model kind `Sersic`");

        // A catalog line cannot be the continuum.
        let json = r#"[{"name": "Ha", "wavelength": 6562.8, "model": "Continuum"}]"#;
        assert!(read_catalog(json.as_bytes()).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let json = r#"[
            {"name": "Ha", "wavelength": 6562.8, "model": "Gaussian"},
            {"name": "Ha", "wavelength": 6563.0, "model": "Gaussian"}
        ]"#;
        assert_eq!(read_catalog(json.as_bytes()).unwrap_err().exit_code(), 2);
    }
}
