//! Input/output helpers.
//!
//! - model bundle save/load with manifest + checksums (`bundle`)
//! - CSV ingest + missing-data summary (`ingest`)
//! - CSV exports (`export`)

pub mod bundle;
pub mod export;
pub mod ingest;

pub use bundle::*;
pub use export::*;
pub use ingest::*;
