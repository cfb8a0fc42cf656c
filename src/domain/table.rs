//! The bounded parameter table.
//!
//! A `ParameterTable` is an ordered list of `ParameterRow`s. Row order is part of
//! the API: `flatten` concatenates the rows' parameters in table order, and that
//! flat vector is what an optimizer sees. Inserting a component therefore shifts
//! the positions of every later parameter.
//!
//! Each row carries its parameters as a `RowParams` variant whose arity is fixed
//! by the type (`Bounded<3>` / `Bounded<4>`), and a `Bounded` can only be built
//! when `min <= value <= max` holds elementwise.

use crate::domain::ModelKind;
use crate::error::PipelineError;
use crate::models::LineShapeProvider;

/// Parameter values with their box constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounded<const N: usize> {
    value: [f64; N],
    min: [f64; N],
    max: [f64; N],
}

/// First element of a `Bounded` that fails `min <= value <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutOfBounds {
    pub index: usize,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl OutOfBounds {
    /// Attach row context.
    pub fn at(self, line: &str, component: u32) -> PipelineError {
        PipelineError::BoundsViolation {
            line: line.to_string(),
            component,
            index: self.index,
            value: self.value,
            min: self.min,
            max: self.max,
        }
    }
}

impl<const N: usize> Bounded<N> {
    pub fn new(value: [f64; N], min: [f64; N], max: [f64; N]) -> Result<Self, OutOfBounds> {
        for i in 0..N {
            // NaN fails both comparisons.
            let ok = min[i] <= value[i] && value[i] <= max[i];
            if !ok {
                return Err(OutOfBounds {
                    index: i,
                    value: value[i],
                    min: min[i],
                    max: max[i],
                });
            }
        }
        Ok(Self { value, min, max })
    }

    fn from_slices(value: &[f64], min: &[f64], max: &[f64]) -> Result<Result<Self, OutOfBounds>, usize> {
        let value = <[f64; N]>::try_from(value).map_err(|_| value.len())?;
        let min = <[f64; N]>::try_from(min).map_err(|_| min.len())?;
        let max = <[f64; N]>::try_from(max).map_err(|_| max.len())?;
        Ok(Self::new(value, min, max))
    }

    pub fn value(&self) -> &[f64; N] {
        &self.value
    }

    pub fn min(&self) -> &[f64; N] {
        &self.min
    }

    pub fn max(&self) -> &[f64; N] {
        &self.max
    }

    fn with_value(&self, value: &[f64]) -> Result<Self, OutOfBounds> {
        let mut v = self.value;
        v.copy_from_slice(value);
        Self::new(v, self.min, self.max)
    }
}

/// Parameters of one row, tagged by model.
///
/// Layouts:
/// - Gaussian `[centroid, amplitude, sigma]`
/// - Lorentzian `[centroid, amplitude, gamma]`
/// - Voigt `[centroid, amplitude, sigma, gamma]`
/// - Continuum `[amplitude, location, shape]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowParams {
    Gaussian(Bounded<3>),
    Lorentzian(Bounded<3>),
    Voigt(Bounded<4>),
    Continuum(Bounded<3>),
}

impl RowParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            RowParams::Gaussian(_) => ModelKind::Gaussian,
            RowParams::Lorentzian(_) => ModelKind::Lorentzian,
            RowParams::Voigt(_) => ModelKind::Voigt,
            RowParams::Continuum(_) => ModelKind::Continuum,
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            RowParams::Gaussian(b) | RowParams::Lorentzian(b) | RowParams::Continuum(b) => &b.value[..],
            RowParams::Voigt(b) => &b.value[..],
        }
    }

    pub fn min(&self) -> &[f64] {
        match self {
            RowParams::Gaussian(b) | RowParams::Lorentzian(b) | RowParams::Continuum(b) => &b.min[..],
            RowParams::Voigt(b) => &b.min[..],
        }
    }

    pub fn max(&self) -> &[f64] {
        match self {
            RowParams::Gaussian(b) | RowParams::Lorentzian(b) | RowParams::Continuum(b) => &b.max[..],
            RowParams::Voigt(b) => &b.max[..],
        }
    }

    pub fn arity(&self) -> usize {
        self.kind().arity()
    }

    /// Build from runtime slices (e.g. a table file).
    ///
    /// Arity mismatches are `InvalidInput`; bounds failures are `BoundsViolation`.
    pub fn from_slices(
        kind: ModelKind,
        value: &[f64],
        min: &[f64],
        max: &[f64],
        line: &str,
        component: u32,
    ) -> Result<Self, PipelineError> {
        let arity_err = |got: usize| {
            PipelineError::InvalidInput(format!(
                "`{line}` component {component}: {kind} expects {} parameters, got {got}",
                kind.arity()
            ))
        };
        let params = match kind {
            ModelKind::Gaussian => Bounded::from_slices(value, min, max)
                .map_err(arity_err)?
                .map(RowParams::Gaussian),
            ModelKind::Lorentzian => Bounded::from_slices(value, min, max)
                .map_err(arity_err)?
                .map(RowParams::Lorentzian),
            ModelKind::Voigt => Bounded::from_slices(value, min, max)
                .map_err(arity_err)?
                .map(RowParams::Voigt),
            ModelKind::Continuum => Bounded::from_slices(value, min, max)
                .map_err(arity_err)?
                .map(RowParams::Continuum),
        };
        params.map_err(|e| e.at(line, component))
    }

    fn with_values(&self, values: &[f64]) -> Result<Self, OutOfBounds> {
        Ok(match self {
            RowParams::Gaussian(b) => RowParams::Gaussian(b.with_value(values)?),
            RowParams::Lorentzian(b) => RowParams::Lorentzian(b.with_value(values)?),
            RowParams::Voigt(b) => RowParams::Voigt(b.with_value(values)?),
            RowParams::Continuum(b) => RowParams::Continuum(b.with_value(values)?),
        })
    }
}

/// One component of one line (or the continuum).
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRow {
    line: String,
    component: u32,
    params: RowParams,
}

pub const CONTINUUM_LINE: &str = "Continuum";

impl ParameterRow {
    /// Component 0 is reserved for the continuum; line components start at 1.
    pub fn new(line: impl Into<String>, component: u32, params: RowParams) -> Result<Self, PipelineError> {
        let line = line.into();
        let is_continuum = params.kind() == ModelKind::Continuum;
        if is_continuum != (component == 0) {
            return Err(PipelineError::InvalidInput(format!(
                "`{line}`: {} rows must use component {}, got {component}",
                params.kind(),
                if is_continuum { "0" } else { ">= 1" }
            )));
        }
        Ok(Self { line, component, params })
    }

    pub fn continuum(params: Bounded<3>) -> Self {
        Self {
            line: CONTINUUM_LINE.to_string(),
            component: 0,
            params: RowParams::Continuum(params),
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn component(&self) -> u32 {
        self.component
    }

    pub fn kind(&self) -> ModelKind {
        self.params.kind()
    }

    pub fn params(&self) -> &RowParams {
        &self.params
    }

    pub fn values(&self) -> &[f64] {
        self.params.values()
    }

    pub fn is_continuum(&self) -> bool {
        self.component == 0
    }
}

/// A per-row failure collected while building or expanding a table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub line: String,
    pub component: Option<u32>,
    pub error: PipelineError,
}

/// Flat optimizer view of a table, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatParameters {
    pub values: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    /// `line:component:index` per entry, for diagnostics.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    rows: Vec<ParameterRow>,
}

impl ParameterTable {
    pub fn new(rows: Vec<ParameterRow>) -> Result<Self, PipelineError> {
        let continuum_rows = rows.iter().filter(|r| r.is_continuum()).count();
        if continuum_rows > 1 {
            return Err(PipelineError::InvalidInput(format!(
                "a table holds at most one continuum row, got {continuum_rows}"
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ParameterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn continuum(&self) -> Option<&ParameterRow> {
        self.rows.iter().find(|r| r.is_continuum())
    }

    /// Rows describing line components (continuum excluded), in table order.
    pub fn line_rows(&self) -> impl Iterator<Item = &ParameterRow> {
        self.rows.iter().filter(|r| !r.is_continuum())
    }

    /// Number of rows belonging to `line`.
    pub fn component_count(&self, line: &str) -> usize {
        self.rows.iter().filter(|r| r.line == line).count()
    }

    pub fn parameter_count(&self) -> usize {
        self.rows.iter().map(|r| r.params.arity()).sum()
    }

    /// Wrap rows already known to hold at most one continuum row.
    pub(crate) fn from_rows_unchecked(rows: Vec<ParameterRow>) -> Self {
        debug_assert!(rows.iter().filter(|r| r.is_continuum()).count() <= 1);
        Self { rows }
    }

    pub fn flatten(&self) -> FlatParameters {
        let n = self.parameter_count();
        let mut flat = FlatParameters {
            values: Vec::with_capacity(n),
            min: Vec::with_capacity(n),
            max: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        };
        for row in &self.rows {
            flat.values.extend_from_slice(row.params.values());
            flat.min.extend_from_slice(row.params.min());
            flat.max.extend_from_slice(row.params.max());
            for i in 0..row.params.arity() {
                flat.labels.push(format!("{}:{}:{i}", row.line, row.component));
            }
        }
        flat
    }

    /// Substitute a flat vector of (fitted) values, keeping the bounds.
    pub fn with_values(&self, values: &[f64]) -> Result<Self, PipelineError> {
        let expected = self.parameter_count();
        if values.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "expected {expected} parameter values, got {}",
                values.len()
            )));
        }

        let mut offset = 0;
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let k = row.params.arity();
            let params = row
                .params
                .with_values(&values[offset..offset + k])
                .map_err(|e| e.at(&row.line, row.component))?;
            offset += k;
            rows.push(ParameterRow {
                line: row.line.clone(),
                component: row.component,
                params,
            });
        }
        Ok(Self { rows })
    }

    /// Sum of every row's profile at `x`.
    pub fn evaluate(&self, provider: &dyn LineShapeProvider, x: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0; x.len()];
        for row in &self.rows {
            let y = match row.kind().profile() {
                Some(profile) => provider.evaluate(profile, x, row.values()),
                None => {
                    let p = row.values();
                    provider.continuum(x, p[0], p[1], p[2])
                }
            };
            for (t, v) in total.iter_mut().zip(y) {
                *t += v;
            }
        }
        total
    }
}
