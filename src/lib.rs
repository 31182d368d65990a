//! `luxury-bi` library crate.
//!
//! The binary (`lbi`) is a thin wrapper around this library so that:
//!
//! - the source/filter/metric/forecast/correlation chain is testable without spawning processes
//! - a dashboard front-end can call the same engines directly
//!
//! Request flow: `data` (resolve, enrich, cache) -> `filter` -> `metrics` /
//! `forecast` / `correlate` -> `report` or `io::export`.

pub mod app;
pub mod cli;
pub mod correlate;
pub mod data;
pub mod domain;
pub mod error;
pub mod filter;
pub mod forecast;
pub mod io;
pub mod math;
pub mod metrics;
pub mod report;
