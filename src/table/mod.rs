//! Building and growing parameter tables.

pub mod builder;
pub mod expand;

pub use builder::*;
pub use expand::*;

/// Lorentzian widths are seeded and bounded at this multiple of the Gaussian sigma.
pub const LORENTZ_WIDTH_FACTOR: f64 = 1.11;

/// `(min, max)` for a fitted continuum `[amplitude, location, shape]`. Only the
/// location is held non-negative; amplitude and index are free.
pub const CONTINUUM_FIT_BOUNDS: ([f64; 3], [f64; 3]) =
    ([f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY], [f64::INFINITY; 3]);
