//! Fitting: the nonlinear least-squares solver, the continuum fit, and the
//! chi-squared objective/goodness-of-fit statistics for a parameter table.

pub mod continuum;
pub mod lm;
pub mod objective;

pub use continuum::*;
pub use lm::*;
pub use objective::*;
