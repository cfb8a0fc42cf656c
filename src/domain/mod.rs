//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input spectrum and line catalog
//! - per-line stage outputs (`DetectedLine`, `ResolvedLine`, `FilteredLine`)
//! - the bounded parameter table handed to the optimizer (`table`)

pub mod table;
pub mod types;

pub use table::*;
pub use types::*;
