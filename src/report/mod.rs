//! Plain-text reports for the terminal.
//!
//! The engines return structured values; this module only turns them into
//! aligned tables. Undefined values are printed as `n/a`, never as zero.

pub mod format;

pub use format::*;
