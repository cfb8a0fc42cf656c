//! Error types.
//!
//! - `PipelineError`: typed failures of the library stages (detection, fitting,
//!   table construction). Per-line and per-row failures are collected into
//!   report values instead of aborting a whole stage.
//! - `AppError`: what the `spl` binary prints, carrying its process exit code.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("no spectrum samples within the window of line `{line}`")]
    CoverageGap { line: String },

    #[error("no prominent maximum found for line `{line}`")]
    NoSignificantPeak { line: String },

    #[error("continuum fit did not converge after {iterations} iterations: {reason}")]
    FitDivergence { iterations: usize, reason: String },

    #[error("unknown model kind `{0}`")]
    UnknownModelKind(String),

    #[error("line `{0}` not found")]
    LineNotFound(String),

    #[error(
        "bounds violated for `{line}` component {component}, parameter {index}: \
         {min} <= {value} <= {max} does not hold"
    )]
    BoundsViolation {
        line: String,
        component: u32,
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Exit code used when the error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::InvalidInput(_) | PipelineError::UnknownModelKind(_) => 2,
            PipelineError::CoverageGap { .. }
            | PipelineError::NoSignificantPeak { .. }
            | PipelineError::LineNotFound(_) => 3,
            PipelineError::FitDivergence { .. } | PipelineError::BoundsViolation { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
