//! Line detection and continuum masking.
//!
//! - `peaks`: local maxima, prominences and half-height widths on a flux array
//! - `detector`: match catalog lines to peaks and measure their widths
//! - `mask`: replace line regions with low-level noise to expose the continuum

pub mod detector;
pub mod mask;
pub mod peaks;

pub use detector::*;
pub use mask::*;
pub use peaks::*;
