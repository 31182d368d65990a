//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - fact rows and the prepared (enriched) dataset
//! - filter selections and filtered views
//! - metric, forecast, and correlation outputs
//! - month arithmetic helpers (`calendar`)

pub mod calendar;
pub mod types;

pub use calendar::*;
pub use types::*;
