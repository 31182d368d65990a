//! Data access: configuration, sources, enrichment, caching.
//!
//! Flow: `SourceResolver` (database, else CSV) -> `enrich` (labels) ->
//! `DatasetCache` (TTL memoization). `quality` and `sample` are side tools.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod quality;
pub mod resolver;
pub mod sample;
pub mod source;

pub use cache::DatasetCache;
pub use config::SourceConfig;
pub use enrich::{enrich, prepare};
pub use quality::{QualityReport, check_dataset};
pub use resolver::SourceResolver;
pub use sample::{SampleConfig, SampleData, generate_sample};
pub use source::{CsvSource, DataSource, SourceTables, SqliteSource};
