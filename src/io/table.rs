//! Parameter table JSON files.
//!
//! The table file is how a setup run hands its output to the external
//! optimizer and how an expansion run picks up fitted values:
//!
//! ```json
//! {
//!   "tool": "spl",
//!   "generated_at": "2026-01-01T00:00:00Z",
//!   "rows": [
//!     {"line": "Ha", "model": "Gaussian", "component": 1,
//!      "parameters": [6563.0, 100.0, 4.0], "min": [6555.0, 0.0, 2.0], "max": [6571.0, 100.0, 6.0]}
//!   ]
//! }
//! ```
//!
//! JSON has no infinities, so an unbounded `min` is written as `null` (−∞) and
//! an unbounded `max` as `null` (+∞).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, ParameterRow, ParameterTable, RowParams};
use crate::error::{AppError, PipelineError};

pub const TOOL_NAME: &str = "spl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub line: String,
    pub model: String,
    pub component: u32,
    pub parameters: Vec<f64>,
    pub min: Vec<Option<f64>>,
    pub max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<TableRecord>,
}

impl TableFile {
    pub fn from_table(table: &ParameterTable) -> Self {
        let rows = table
            .rows()
            .iter()
            .map(|row| TableRecord {
                line: row.line().to_string(),
                model: row.kind().name().to_string(),
                component: row.component(),
                parameters: row.values().to_vec(),
                min: row.params().min().iter().map(|&v| finite_or_none(v)).collect(),
                max: row.params().max().iter().map(|&v| finite_or_none(v)).collect(),
            })
            .collect();
        Self {
            tool: TOOL_NAME.to_string(),
            generated_at: Utc::now(),
            rows,
        }
    }

    /// Validate every row and rebuild the table; the first failure is returned.
    pub fn to_table(&self) -> Result<ParameterTable, PipelineError> {
        let rows = self
            .rows
            .iter()
            .map(|record| {
                let kind: ModelKind = record.model.parse()?;
                let min: Vec<f64> = record.min.iter().map(|v| v.unwrap_or(f64::NEG_INFINITY)).collect();
                let max: Vec<f64> = record.max.iter().map(|v| v.unwrap_or(f64::INFINITY)).collect();
                let params =
                    RowParams::from_slices(kind, &record.parameters, &min, &max, &record.line, record.component)?;
                ParameterRow::new(record.line.clone(), record.component, params)
            })
            .collect::<Result<Vec<_>, _>>()?;
        ParameterTable::new(rows)
    }
}

fn finite_or_none(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn write_table_json(path: &Path, table: &ParameterTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create table JSON '{}': {e}", path.display())))?;
    write_table(file, table)
}

pub fn write_table<W: Write>(out: W, table: &ParameterTable) -> Result<(), AppError> {
    serde_json::to_writer_pretty(out, &TableFile::from_table(table))
        .map_err(|e| AppError::new(2, format!("Failed to write table JSON: {e}")))
}

pub fn read_table_json(path: &Path) -> Result<ParameterTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open table JSON '{}': {e}", path.display())))?;
    read_table(file)
}

pub fn read_table<R: Read>(input: R) -> Result<ParameterTable, AppError> {
    let file: TableFile =
        serde_json::from_reader(input).map_err(|e| AppError::new(2, format!("Invalid table JSON: {e}")))?;
    Ok(file.to_table()?)
}
