//! Primary-then-fallback source resolution.

use crate::data::config::SourceConfig;
use crate::data::enrich::prepare;
use crate::data::source::{CsvSource, DataSource, SourceTables, SqliteSource};
use crate::domain::PreparedDataset;
use crate::error::{AppError, AppResult};

/// Ordered fallback over two sources: at most one hop, no retries.
pub struct SourceResolver {
    primary: Option<Box<dyn DataSource>>,
    fallback: Box<dyn DataSource>,
    force_fallback: bool,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("primary", &self.primary.as_ref().map(|s| s.describe()))
            .field("fallback", &self.fallback.describe())
            .field("force_fallback", &self.force_fallback)
            .finish()
    }
}

impl SourceResolver {
    pub fn new(primary: Option<Box<dyn DataSource>>, fallback: Box<dyn DataSource>) -> Self {
        Self {
            primary,
            fallback,
            force_fallback: false,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let primary = config
            .database_url
            .as_ref()
            .map(|url| Box::new(SqliteSource::new(url.clone())) as Box<dyn DataSource>);

        let fallback = CsvSource {
            facts: config.fact_candidates(),
            brands: config.brands_csv.clone(),
            countries: config.countries_csv.clone(),
        };

        Self::new(primary, Box::new(fallback)).force_fallback(config.force_fallback)
    }

    pub fn force_fallback(mut self, force: bool) -> Self {
        self.force_fallback = force;
        self
    }

    /// Fetch, validate, and enrich the fact table.
    pub fn resolve(&self) -> AppResult<PreparedDataset> {
        let tables = self.fetch_tables()?;
        let dataset = prepare(tables);
        log::info!(
            "source: prepared {} rows from {:?} ({} skipped)",
            dataset.rows.len(),
            dataset.source,
            dataset.row_errors.len()
        );
        Ok(dataset)
    }

    fn fetch_tables(&self) -> AppResult<SourceTables> {
        let mut primary_failure: Option<String> = None;

        match (&self.primary, self.force_fallback) {
            (Some(primary), false) => match primary.fetch() {
                Ok(tables) if !tables.facts.facts.is_empty() => return Ok(tables),
                Ok(_) => {
                    log::warn!("source: {} returned no usable rows, using fallback", primary.describe());
                    primary_failure = Some(format!("{} returned no usable rows", primary.describe()));
                }
                Err(e) => {
                    log::warn!("source: {} unavailable ({e}), using fallback", primary.describe());
                    primary_failure = Some(format!("{}: {e}", primary.describe()));
                }
            },
            (Some(primary), true) => {
                log::debug!("source: fallback-only mode, skipping {}", primary.describe());
            }
            (None, _) => {}
        }

        let tables = match self.fallback.fetch() {
            Ok(tables) => tables,
            Err(AppError::SchemaMismatch(msg)) => return Err(AppError::SchemaMismatch(msg)),
            Err(e) => {
                let detail = match primary_failure {
                    Some(p) => format!("primary failed ({p}); fallback failed ({e})"),
                    None => format!("fallback failed ({e})"),
                };
                return Err(AppError::DataUnavailable(detail));
            }
        };

        if tables.facts.facts.is_empty() {
            return Err(AppError::DataUnavailable(format!(
                "{} contains no valid rows ({} rejected)",
                self.fallback.describe(),
                tables.facts.row_errors.len()
            )));
        }
        Ok(tables)
    }
}
