//! The chi-squared objective an external optimizer minimizes, and the
//! goodness-of-fit statistics reported next to its results.
//!
//! - `χ² = Σ ((y_i - m_i) / σ_i)²` over samples with finite flux and a positive,
//!   finite flux error
//! - reduced `χ² / (n - k)`
//! - `BIC = χ² + k ln n`

use serde::{Deserialize, Serialize};

use crate::domain::{ParameterTable, Spectrum};
use crate::error::PipelineError;
use crate::models::LineShapeProvider;

/// Goodness-of-fit statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goodness {
    pub chi_squared: f64,
    pub reduced_chi_squared: f64,
    pub bic: f64,
}

/// Chi-squared of `table` against `spectrum`, as a function of the flat
/// parameter vector.
///
/// Parameters are mapped positionally through `ParameterTable::with_values`, so
/// a vector outside the table's bounds evaluates to `+∞` (the usual way a
/// bounded sampler encodes an improper prior).
pub struct Objective<'a> {
    table: &'a ParameterTable,
    provider: &'a dyn LineShapeProvider,
    x: Vec<f64>,
    y: Vec<f64>,
    sigma: Vec<f64>,
}

impl<'a> Objective<'a> {
    pub fn new(spectrum: &Spectrum, table: &'a ParameterTable, provider: &'a dyn LineShapeProvider) -> Self {
        let mut x = Vec::with_capacity(spectrum.len());
        let mut y = Vec::with_capacity(spectrum.len());
        let mut sigma = Vec::with_capacity(spectrum.len());
        for ((&w, &f), &e) in spectrum
            .wavelength()
            .iter()
            .zip(spectrum.flux())
            .zip(spectrum.flux_error())
        {
            if f.is_finite() && e.is_finite() && e > 0.0 {
                x.push(w);
                y.push(f);
                sigma.push(e);
            }
        }
        Self {
            table,
            provider,
            x,
            y,
            sigma,
        }
    }

    /// Number of samples that enter the sum.
    pub fn sample_count(&self) -> usize {
        self.x.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.table.parameter_count()
    }

    /// χ² at the table's current values.
    pub fn current(&self) -> f64 {
        self.chi_squared_of(self.table)
    }

    /// χ² at a flat parameter vector.
    pub fn evaluate(&self, theta: &[f64]) -> f64 {
        match self.table.with_values(theta) {
            Ok(candidate) => self.chi_squared_of(&candidate),
            Err(_) => f64::INFINITY,
        }
    }

    fn chi_squared_of(&self, table: &ParameterTable) -> f64 {
        let model = table.evaluate(self.provider, &self.x);
        self.y
            .iter()
            .zip(&model)
            .zip(&self.sigma)
            .map(|((y, m), s)| {
                let z = (y - m) / s;
                z * z
            })
            .sum()
    }

    pub fn goodness(&self) -> Result<Goodness, PipelineError> {
        let n = self.sample_count();
        let k = self.parameter_count();
        if n <= k {
            return Err(PipelineError::InvalidInput(format!(
                "{n} usable samples leave no degrees of freedom for {k} parameters"
            )));
        }
        let chi_squared = self.current();
        Ok(Goodness {
            chi_squared,
            reduced_chi_squared: chi_squared / (n - k) as f64,
            bic: chi_squared + k as f64 * (n as f64).ln(),
        })
    }
}
