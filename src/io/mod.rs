//! Input/output helpers.
//!
//! - CSV/database cell ingest + schema validation (`ingest`)
//! - result exports (CSV/JSON) and sample files (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
