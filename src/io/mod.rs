//! Input/output helpers.
//!
//! - spectrum CSV ingest + validation (`ingest`)
//! - line catalog JSON (`catalog`)
//! - parameter table JSON read/write (`table`)
//! - fit outcome JSON + results CSV export (`export`)

pub mod catalog;
pub mod export;
pub mod ingest;
pub mod table;

pub use catalog::*;
pub use export::*;
pub use ingest::*;
pub use table::*;
