//! Data sources for the monthly fact table.
//!
//! Both sources return the same logical schema (`SourceTables`): the raw
//! cells are funnelled through `io::ingest`, so a database and a CSV export
//! are validated by exactly the same rules.

use std::path::PathBuf;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::data::config::first_existing;
use crate::domain::{Dimension, DimensionTable, SourceKind};
use crate::error::{AppError, AppResult};
use crate::io::ingest::{ParsedFacts, RawTable, parse_dimension_table, parse_fact_table, read_csv_table};

/// Aggregated monthly view produced by the upstream ETL.
pub const FACT_TABLE: &str = "mv_month_brand_country";
pub const BRAND_DIM_TABLE: &str = "dim_marque";
pub const COUNTRY_DIM_TABLE: &str = "dim_pays";

/// Fact rows and lookup tables fetched from one source.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub facts: ParsedFacts,
    pub brands: DimensionTable,
    pub countries: DimensionTable,
    pub origin: SourceKind,
}

/// A place the fact table can be fetched from.
pub trait DataSource: Send + Sync {
    /// Short human-readable description for logs and errors.
    fn describe(&self) -> String;

    fn fetch(&self) -> AppResult<SourceTables>;
}

/// SQLite-backed relational source.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    url: String,
}

impl SqliteSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn path(&self) -> AppResult<&str> {
        let url = self.url.trim();
        if let Some(path) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) {
            return Ok(path);
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(AppError::DataUnavailable(format!(
                "Unsupported database scheme '{scheme}' (only sqlite is available)"
            )));
        }
        Ok(url)
    }

    fn open(&self) -> AppResult<Connection> {
        let path = self.path()?;
        // Read-only: a missing database must fail rather than be created empty.
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI)?;
        Ok(conn)
    }
}

impl DataSource for SqliteSource {
    fn describe(&self) -> String {
        format!("database '{}'", self.url)
    }

    fn fetch(&self) -> AppResult<SourceTables> {
        let conn = self.open()?;

        let raw = query_table(&conn, &format!("SELECT * FROM {FACT_TABLE}"))?;
        let facts = parse_fact_table(&raw)?;

        let brands = read_dimension(&conn, BRAND_DIM_TABLE, Dimension::Brand)?;
        let countries = read_dimension(&conn, COUNTRY_DIM_TABLE, Dimension::Country)?;

        Ok(SourceTables {
            facts,
            brands,
            countries,
            origin: SourceKind::Database(self.url.clone()),
        })
    }
}

fn read_dimension(conn: &Connection, table: &str, dimension: Dimension) -> AppResult<DimensionTable> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;

    if exists.is_none() {
        log::debug!("source: dimension table '{table}' not found, labels fall back to keys");
        return Ok(DimensionTable::new());
    }

    let raw = query_table(conn, &format!("SELECT * FROM {table}"))?;
    parse_dimension_table(&raw, dimension)
}

fn query_table(conn: &Connection, sql: &str) -> AppResult<RawTable> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut query = stmt.query([])?;
    let mut line = 0usize;
    while let Some(row) = query.next()? {
        line += 1;
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(value_to_cell(row.get_ref(idx)?));
        }
        rows.push((line, cells));
    }

    Ok(RawTable { columns, rows })
}

fn value_to_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

/// CSV exports of the fact table and its dimensions.
#[derive(Debug, Clone)]
pub struct CsvSource {
    /// Fact file locations, probed in order.
    pub facts: Vec<PathBuf>,
    pub brands: Option<PathBuf>,
    pub countries: Option<PathBuf>,
}

impl CsvSource {
    pub fn new(facts: impl Into<PathBuf>) -> Self {
        Self {
            facts: vec![facts.into()],
            brands: None,
            countries: None,
        }
    }

    pub fn with_dimensions(mut self, brands: Option<PathBuf>, countries: Option<PathBuf>) -> Self {
        self.brands = brands;
        self.countries = countries;
        self
    }
}

impl DataSource for CsvSource {
    fn describe(&self) -> String {
        let list: Vec<String> = self.facts.iter().map(|p| p.display().to_string()).collect();
        format!("file(s) [{}]", list.join(", "))
    }

    fn fetch(&self) -> AppResult<SourceTables> {
        let path = first_existing(&self.facts)
            .ok_or_else(|| AppError::DataUnavailable(format!("No fact file found among {}", self.describe())))?
            .to_path_buf();

        let raw = read_csv_table(&path)?;
        if raw.rows.is_empty() {
            return Err(AppError::DataUnavailable(format!("Fact file '{}' is empty", path.display())));
        }
        let facts = parse_fact_table(&raw)?;

        let brands = read_dimension_file(self.brands.as_ref(), Dimension::Brand)?;
        let countries = read_dimension_file(self.countries.as_ref(), Dimension::Country)?;

        Ok(SourceTables {
            facts,
            brands,
            countries,
            origin: SourceKind::File(path),
        })
    }
}

fn read_dimension_file(path: Option<&PathBuf>, dimension: Dimension) -> AppResult<DimensionTable> {
    let Some(path) = path else {
        return Ok(DimensionTable::new());
    };
    if !path.is_file() {
        log::warn!(
            "source: {} dimension file '{}' not found, labels fall back to keys",
            dimension.display_name(),
            path.display()
        );
        return Ok(DimensionTable::new());
    }
    match read_csv_table(path).and_then(|raw| parse_dimension_table(&raw, dimension)) {
        Ok(table) => Ok(table),
        Err(err) => {
            log::warn!(
                "source: {} dimension file '{}' unreadable ({err}), labels fall back to keys",
                dimension.display_name(),
                path.display()
            );
            Ok(DimensionTable::new())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    /// Unique scratch path under the system temp dir.
    pub(crate) fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lbi-test-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub(crate) fn write_facts_csv(path: &Path) {
        fs::write(
            path,
            "month_key,marque_key,pays_key,ca,unites,aov,marge_pct_avg,ca_online,ca_offline\n\
             2024-01-01,1,1,1000,2,500,60,300,700\n\
             2024-02-01,2,9,500,1,500,55,100,400\n",
        )
        .unwrap();
    }

    #[test]
    fn csv_source_reads_facts_and_dimensions() {
        let dir = scratch("csv-source");
        let facts = dir.join("facts.csv");
        let brands = dir.join("brands.csv");
        write_facts_csv(&facts);
        fs::write(&brands, "marque_key,marque_nom\n1,Dior\n").unwrap();

        let source = CsvSource::new(&facts).with_dimensions(Some(brands), None);
        let tables = source.fetch().unwrap();
        assert_eq!(tables.facts.facts.len(), 2);
        assert_eq!(tables.brands.get("1"), Some("Dior"));
        assert!(tables.countries.is_empty());
        assert_eq!(tables.origin, SourceKind::File(facts));
    }

    #[test]
    fn latin1_dimension_file_still_labels_rows() {
        let dir = scratch("csv-latin1");
        let facts = dir.join("facts.csv");
        let brands = dir.join("brands.csv");
        let countries = dir.join("countries.csv");
        write_facts_csv(&facts);
        fs::write(&brands, b"marque_key,marque_nom\n1,Herm\xe8s\n2,Dior\n").unwrap();
        fs::write(&countries, "no_key_here,nor_label\n1,France\n").unwrap();

        let source = CsvSource::new(&facts).with_dimensions(Some(brands), Some(countries));
        let tables = source.fetch().unwrap();
        assert_eq!(tables.facts.facts.len(), 2);
        assert_eq!(tables.brands.get("1"), Some("Herm\u{fffd}s"));
        assert_eq!(tables.brands.get("2"), Some("Dior"));
        assert!(tables.countries.is_empty());
    }

    #[test]
    fn csv_source_missing_or_empty_is_unavailable() {
        let dir = scratch("csv-empty");
        let missing = CsvSource::new(dir.join("nope.csv"));
        assert!(matches!(missing.fetch(), Err(AppError::DataUnavailable(_))));

        let empty = dir.join("empty.csv");
        fs::write(&empty, "month_key,marque_key,pays_key,ca\n").unwrap();
        assert!(matches!(CsvSource::new(&empty).fetch(), Err(AppError::DataUnavailable(_))));
    }

    #[test]
    fn sqlite_source_reads_view_and_dimensions() {
        let dir = scratch("sqlite-source");
        let db = dir.join("bi.db");
        let _ = fs::remove_file(&db);
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch(
                "CREATE TABLE mv_month_brand_country (
                    month_key TEXT, marque_key INTEGER, pays_key INTEGER,
                    ca REAL, unites INTEGER, aov REAL, marge_pct_avg REAL,
                    ca_online REAL, ca_offline REAL);
                 INSERT INTO mv_month_brand_country VALUES ('2024-01-01', 1, 1, 1000.0, 2, 500.0, 60.0, 300.0, 700.0);
                 CREATE TABLE dim_pays (pays_key INTEGER, pays_nom TEXT);
                 INSERT INTO dim_pays VALUES (1, 'France');",
            )
            .unwrap();
        }

        let source = SqliteSource::new(format!("sqlite://{}", db.display()));
        let tables = source.fetch().unwrap();
        assert_eq!(tables.facts.facts.len(), 1);
        assert_eq!(tables.facts.facts[0].brand_key, "1");
        assert_eq!(tables.facts.facts[0].revenue, Some(1000.0));
        assert_eq!(tables.countries.get("1"), Some("France"));
        assert!(tables.brands.is_empty());
    }

    #[test]
    fn sqlite_source_rejects_other_schemes() {
        let source = SqliteSource::new("postgres://user@host/db");
        assert!(matches!(source.fetch(), Err(AppError::DataUnavailable(_))));
    }
}
