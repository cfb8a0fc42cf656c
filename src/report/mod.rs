//! Reporting utilities: terminal summaries of setup and expansion runs.

pub mod format;

pub use format::*;
