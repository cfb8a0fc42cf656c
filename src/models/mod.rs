//! Line-profile and continuum models.
//!
//! Models are implemented as small, pure functions so that detection and fitting
//! code can stay generic over the evaluator.

pub mod model;

pub use model::*;
