//! Tabular ingest and schema validation.
//!
//! Both data sources (database and CSV) are first read into a `RawTable`
//! of strings, then parsed here. That keeps a single schema-validation step
//! at the boundary of the core:
//!
//! - **Strict schema** for required columns (`SchemaMismatch`, exit code 2)
//! - **Row-level validation** (skip rows with an unusable month, report them)
//! - **Lenient numerics** (unparseable numbers become missing)

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{Dimension, DimensionTable, FactRow, RowError, SignalTable, first_of_month};
use crate::error::{AppError, AppResult};

const MONTH_ALIASES: &[&str] = &["month_key", "month", "date"];
const BRAND_KEY_ALIASES: &[&str] = &["marque_key", "brand_key", "brand"];
const COUNTRY_KEY_ALIASES: &[&str] = &["pays_key", "country_key", "country"];
const REVENUE_ALIASES: &[&str] = &["ca", "revenue"];
const UNITS_ALIASES: &[&str] = &["unites", "units"];
const AOV_ALIASES: &[&str] = &["aov", "average_order_value"];
const MARGIN_ALIASES: &[&str] = &["marge_pct_avg", "margin_pct", "average_margin_pct"];
const ONLINE_ALIASES: &[&str] = &["ca_online", "online_revenue"];
const OFFLINE_ALIASES: &[&str] = &["ca_offline", "offline_revenue"];

/// A table of string cells with the original header names.
///
/// Each row carries the 1-based line it came from (for error reports).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
}

/// Parsed fact rows plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedFacts {
    pub facts: Vec<FactRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Column positions for the fact table, resolved once per table.
#[derive(Debug, Clone, Copy)]
struct FactSchema {
    month: usize,
    brand: usize,
    country: usize,
    revenue: usize,
    units: Option<usize>,
    aov: Option<usize>,
    margin: Option<usize>,
    online: Option<usize>,
    offline: Option<usize>,
}

/// Read a CSV file into a `RawTable`.
pub fn read_csv_table(path: &Path) -> AppResult<RawTable> {
    let file = File::open(path).map_err(|e| {
        AppError::DataUnavailable(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let columns = decode_record(reader.byte_headers()?);

    let mut rows = Vec::new();
    let mut lossy = 0usize;
    for (idx, result) in reader.byte_records().enumerate() {
        // +2: records start after the header line, and lines are 1-based.
        let line = idx + 2;
        let record = result?;
        if std::str::from_utf8(record.as_slice()).is_err() {
            lossy += 1;
        }
        rows.push((line, decode_record(&record)));
    }
    if lossy > 0 {
        log::warn!(
            "ingest: {lossy} row(s) in '{}' are not valid UTF-8; invalid bytes were replaced",
            path.display()
        );
    }

    Ok(RawTable { columns, rows })
}

/// Cells that are not valid UTF-8 (e.g. a Latin-1 export) are decoded lossily.
fn decode_record(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Read a signal file (date/topic/score with arbitrary column names).
pub fn read_signal_table(path: &Path) -> AppResult<SignalTable> {
    let raw = read_csv_table(path)?;
    Ok(SignalTable {
        columns: raw.columns,
        rows: raw.rows.into_iter().map(|(_, cells)| cells).collect(),
    })
}

/// Validate the fact schema and parse every row.
pub fn parse_fact_table(raw: &RawTable) -> AppResult<ParsedFacts> {
    let header_map = build_header_map(&raw.columns);
    let schema = resolve_fact_schema(&header_map)?;

    let mut facts = Vec::with_capacity(raw.rows.len());
    let mut row_errors = Vec::new();

    for (line, cells) in &raw.rows {
        match parse_fact_row(cells, &schema) {
            Ok(fact) => facts.push(fact),
            Err(message) => row_errors.push(RowError { line: *line, message }),
        }
    }

    if !row_errors.is_empty() {
        log::debug!("ingest: skipped {} of {} fact rows", row_errors.len(), raw.rows.len());
    }

    Ok(ParsedFacts {
        facts,
        row_errors,
        rows_read: raw.rows.len(),
    })
}

/// Parse a `key -> label` dimension table.
///
/// Duplicate keys keep their first label; rows with an empty key are ignored.
pub fn parse_dimension_table(raw: &RawTable, dimension: Dimension) -> AppResult<DimensionTable> {
    let header_map = build_header_map(&raw.columns);
    let (key_aliases, label_aliases): (&[&str], &[&str]) = match dimension {
        Dimension::Brand => (
            &["marque_key", "brand_key", "marque_code", "key", "code"],
            &["marque_nom", "brand_name", "brand", "label", "name"],
        ),
        Dimension::Country => (
            &["pays_key", "country_key", "pays_iso2", "key", "code"],
            &["pays_nom", "country_name", "country", "label", "name"],
        ),
    };

    let key_idx = find_column(&header_map, key_aliases).ok_or_else(|| {
        AppError::SchemaMismatch(format!(
            "{} dimension has no key column (expected one of: {})",
            dimension.display_name(),
            key_aliases.join(", ")
        ))
    })?;
    let label_idx = find_column(&header_map, label_aliases).ok_or_else(|| {
        AppError::SchemaMismatch(format!(
            "{} dimension has no label column (expected one of: {})",
            dimension.display_name(),
            label_aliases.join(", ")
        ))
    })?;

    let mut table = DimensionTable::new();
    for (line, cells) in &raw.rows {
        let Some(key) = cell(cells, key_idx).map(normalize_key) else {
            continue;
        };
        let label = cell(cells, label_idx).unwrap_or(&key).to_string();
        if !table.insert(key.clone(), label) {
            log::debug!("ingest: duplicate {} key '{key}' on line {line}", dimension.display_name());
        }
    }
    Ok(table)
}

fn resolve_fact_schema(header_map: &HashMap<String, usize>) -> AppResult<FactSchema> {
    let required = |aliases: &[&str], field: &str| {
        find_column(header_map, aliases).ok_or_else(|| {
            AppError::SchemaMismatch(format!(
                "Missing required column for {field} (expected one of: {})",
                aliases.join(", ")
            ))
        })
    };

    Ok(FactSchema {
        month: required(MONTH_ALIASES, "month")?,
        brand: required(BRAND_KEY_ALIASES, "brand key")?,
        country: required(COUNTRY_KEY_ALIASES, "country key")?,
        revenue: required(REVENUE_ALIASES, "revenue")?,
        units: find_column(header_map, UNITS_ALIASES),
        aov: find_column(header_map, AOV_ALIASES),
        margin: find_column(header_map, MARGIN_ALIASES),
        online: find_column(header_map, ONLINE_ALIASES),
        offline: find_column(header_map, OFFLINE_ALIASES),
    })
}

fn parse_fact_row(cells: &[String], schema: &FactSchema) -> Result<FactRow, String> {
    let raw_month = cell(cells, schema.month).ok_or_else(|| "Missing month value.".to_string())?;
    let month = parse_date(raw_month)
        .map(first_of_month)
        .ok_or_else(|| format!("Invalid month '{raw_month}'."))?;

    let brand_key = cell(cells, schema.brand)
        .map(normalize_key)
        .ok_or_else(|| "Missing brand key.".to_string())?;
    let country_key = cell(cells, schema.country)
        .map(normalize_key)
        .ok_or_else(|| "Missing country key.".to_string())?;

    let number = |idx: Option<usize>| idx.and_then(|i| parse_opt_f64(cell(cells, i)));

    Ok(FactRow {
        month,
        brand_key,
        country_key,
        revenue: number(Some(schema.revenue)),
        units: number(schema.units),
        aov: number(schema.aov),
        margin_pct: number(schema.margin),
        online_revenue: number(schema.online),
        offline_revenue: number(schema.offline),
    })
}

pub(crate) fn build_header_map(headers: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins on duplicate headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| header_map.get(*a).copied())
}

fn cell(cells: &[String], idx: usize) -> Option<&str> {
    cells.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Integer-valued keys read from a database come back as `"1.0"`; make them
/// match the `"1"` a CSV would carry.
fn normalize_key(raw: &str) -> String {
    match raw.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit()) => int.to_string(),
        _ => raw.to_string(),
    }
}

/// Parse a date in one of the common export formats.
///
/// Timestamps are accepted and truncated to their date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];
    let s = s.trim();
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);

    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(d);
        }
    }
    // `YYYY-MM` month keys.
    NaiveDate::parse_from_str(&format!("{date_part}-01"), "%Y-%m-%d").ok()
}

pub(crate) fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
