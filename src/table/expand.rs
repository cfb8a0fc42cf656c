//! Adding components to a fitted table.
//!
//! After a fit, lines that need a broader or asymmetric profile get extra
//! components. Each new component is inserted right after the line's last
//! row, starting from that row's values with the amplitude halved. Bounds are
//! then recomputed for every row from its current values, so the result is a
//! fresh starting point for the next fit.
//!
//! A line is expanded as a unit. If any of its rows, old or new, falls outside
//! the recomputed box, the line keeps its incoming rows and bounds unchanged
//! and the violations are reported.

use std::collections::HashSet;

use log::{info, warn};

use crate::domain::{Bounded, ModelKind, OutOfBounds, ParameterRow, ParameterTable, RowIssue, RowParams};
use crate::error::PipelineError;
use crate::filter::{MAX_SIGMA_FACTOR, MIN_SIGMA_BOUND};
use crate::table::{CONTINUUM_FIT_BOUNDS, LORENTZ_WIDTH_FACTOR};

/// Expanded table plus the additions and rows that were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub table: ParameterTable,
    pub issues: Vec<RowIssue>,
}

/// A row before bounds are attached.
#[derive(Debug, Clone)]
struct Draft {
    line: String,
    component: u32,
    kind: ModelKind,
    values: Vec<f64>,
    /// Position in the incoming table; `None` for added components.
    original: Option<usize>,
}

impl Draft {
    fn key(&self) -> (&str, bool) {
        (&self.line, self.kind == ModelKind::Continuum)
    }
}

/// Append components to lines of `table` and recompute every row's bounds.
///
/// Reported rather than applied:
/// - `LineNotFound` for a name with no line rows
/// - `UnknownModelKind` for a `Continuum` request
/// - `BoundsViolation` for a row whose values leave the recomputed box; the
///   whole line is then left as it came in. A Lorentzian or Voigt added after
///   a Gaussian with `σ < 1.11·2.0` always lands here, since its width starts
///   below the Lorentzian width floor.
pub fn expand(table: &ParameterTable, additions: &[(String, Vec<ModelKind>)]) -> Expansion {
    let mut drafts: Vec<Draft> = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| Draft {
            line: row.line().to_string(),
            component: row.component(),
            kind: row.kind(),
            values: row.values().to_vec(),
            original: Some(i),
        })
        .collect();
    let mut issues = Vec::new();

    for (line, kinds) in additions {
        let Some(mut last) = last_row_of(&drafts, line) else {
            warn!("{line} not found in the table");
            issues.push(RowIssue {
                line: line.clone(),
                component: None,
                error: PipelineError::LineNotFound(line.clone()),
            });
            continue;
        };

        for &kind in kinds {
            if kind == ModelKind::Continuum {
                issues.push(RowIssue {
                    line: line.clone(),
                    component: None,
                    error: PipelineError::UnknownModelKind(format!("{kind} is not a line component")),
                });
                continue;
            }
            let draft = next_component(&drafts[last], kind);
            info!("adding {kind} component {} for {line}", draft.component);
            drafts.insert(last + 1, draft);
            last += 1;
        }
    }

    let bounded: Vec<Result<ParameterRow, PipelineError>> = drafts
        .iter()
        .map(|draft| {
            let components = drafts.iter().filter(|d| d.key() == draft.key()).count();
            bounded_row(draft, components)
        })
        .collect();

    let mut rejected: HashSet<(&str, bool)> = HashSet::new();
    for (draft, result) in drafts.iter().zip(&bounded) {
        if let Err(error) = result {
            warn!(
                "{} component {} leaves its recomputed bounds, keeping {} as it was: {error}",
                draft.line, draft.component, draft.line
            );
            issues.push(RowIssue {
                line: draft.line.clone(),
                component: Some(draft.component),
                error: error.clone(),
            });
            rejected.insert(draft.key());
        }
    }

    let mut rows = Vec::with_capacity(drafts.len());
    for (draft, result) in drafts.iter().zip(bounded) {
        if rejected.contains(&draft.key()) {
            if let Some(i) = draft.original {
                rows.push(table.rows()[i].clone());
            }
        } else if let Ok(row) = result {
            rows.push(row);
        }
    }

    Expansion {
        table: ParameterTable::from_rows_unchecked(rows),
        issues,
    }
}

/// Index of the highest-component line row named `line`.
fn last_row_of(drafts: &[Draft], line: &str) -> Option<usize> {
    drafts
        .iter()
        .enumerate()
        .filter(|(_, d)| d.line == line && d.kind != ModelKind::Continuum)
        .max_by_key(|&(i, d)| (d.component, i))
        .map(|(i, _)| i)
}

fn next_component(prev: &Draft, kind: ModelKind) -> Draft {
    let (center, amplitude, width) = (prev.values[0], prev.values[1] / 2.0, prev.values[2]);
    let values = match kind {
        ModelKind::Voigt => {
            let gamma = if prev.kind == ModelKind::Voigt {
                prev.values[3]
            } else {
                LORENTZ_WIDTH_FACTOR * width
            };
            vec![center, amplitude, width, gamma]
        }
        _ => vec![center, amplitude, width],
    };
    Draft {
        line: prev.line.clone(),
        component: prev.component + 1,
        kind,
        values,
        original: None,
    }
}

/// Ceiling on a component's amplitude, as a multiple of its current value.
fn amplitude_factor(component: u32, components: usize) -> f64 {
    match component {
        1 if components > 1 => 2.0,
        1 => 1.0,
        2 => 2.0,
        c => 2f64.powi(c as i32 - 1),
    }
}

fn bounded_row(draft: &Draft, components: usize) -> Result<ParameterRow, PipelineError> {
    let v = &draft.values;
    let at = |oob: OutOfBounds| oob.at(&draft.line, draft.component);

    let sigma = v[2];
    let (loc_lo, loc_hi) = (v[0] - 2.0 * sigma, v[0] + 2.0 * sigma);
    let (sd_lo, sd_hi) = (MIN_SIGMA_BOUND, MAX_SIGMA_FACTOR * sigma);
    let amp_hi = v[1] * amplitude_factor(draft.component, components);
    let l = LORENTZ_WIDTH_FACTOR;

    let params = match draft.kind {
        ModelKind::Gaussian => RowParams::Gaussian(
            Bounded::new([v[0], v[1], v[2]], [loc_lo, 0.0, sd_lo], [loc_hi, amp_hi, sd_hi]).map_err(at)?,
        ),
        ModelKind::Lorentzian => RowParams::Lorentzian(
            Bounded::new(
                [v[0], v[1], v[2]],
                [loc_lo, 0.0, l * sd_lo],
                [loc_hi, amp_hi, l * sd_hi],
            )
            .map_err(at)?,
        ),
        ModelKind::Voigt => RowParams::Voigt(
            Bounded::new(
                [v[0], v[1], v[2], v[3]],
                [loc_lo, 0.0, sd_lo, l * sd_lo],
                [loc_hi, amp_hi, sd_hi, l * sd_hi],
            )
            .map_err(at)?,
        ),
        ModelKind::Continuum => {
            let (min, max) = CONTINUUM_FIT_BOUNDS;
            RowParams::Continuum(Bounded::new([v[0], v[1], v[2]], min, max).map_err(at)?)
        }
    };
    ParameterRow::new(draft.line.clone(), draft.component, params)
}
