//! `spl-setup` library crate.
//!
//! Prepares bounded parameter tables for fitting emission lines in 1-D spectra.
//! The binary (`spl`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the stages (detection, filtering, table building, expansion) can be driven
//!   directly from other tools

pub mod app;
pub mod cli;
pub mod detect;
pub mod domain;
pub mod error;
pub mod filter;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod table;
