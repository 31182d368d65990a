//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory by the filter/metric/forecast engines
//! - exported to JSON/CSV for the presentation layer
//! - rebuilt cheaply from either data source

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One raw `(month, brand, country)` observation, after type coercion.
///
/// Numeric cells that could not be parsed are `None` ("missing").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    /// First day of the observed month.
    pub month: NaiveDate,
    pub brand_key: String,
    pub country_key: String,
    pub revenue: Option<f64>,
    pub units: Option<f64>,
    pub aov: Option<f64>,
    pub margin_pct: Option<f64>,
    pub online_revenue: Option<f64>,
    pub offline_revenue: Option<f64>,
}

/// A fact row with display labels and calendar columns attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRow {
    pub month: NaiveDate,
    pub year: i32,
    pub month_number: u32,
    pub quarter: u32,
    /// Canonical `YYYY-MM` string.
    pub month_label: String,
    pub brand_key: String,
    pub brand: String,
    pub country_key: String,
    pub country: String,
    pub revenue: Option<f64>,
    pub units: Option<f64>,
    pub aov: Option<f64>,
    pub margin_pct: Option<f64>,
    pub online_revenue: Option<f64>,
    pub offline_revenue: Option<f64>,
}

impl PreparedRow {
    pub fn from_fact(fact: FactRow, brand: String, country: String) -> Self {
        let month = fact.month;
        Self {
            month,
            year: month.year(),
            month_number: month.month(),
            quarter: (month.month() - 1) / 3 + 1,
            month_label: month.format("%Y-%m").to_string(),
            brand_key: fact.brand_key,
            brand,
            country_key: fact.country_key,
            country,
            revenue: fact.revenue,
            units: fact.units,
            aov: fact.aov,
            margin_pct: fact.margin_pct,
            online_revenue: fact.online_revenue,
            offline_revenue: fact.offline_revenue,
        }
    }

    pub fn label(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Brand => &self.brand,
            Dimension::Country => &self.country,
        }
    }
}

/// A row-level problem encountered while reading a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Where a prepared dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum SourceKind {
    Database(String),
    File(PathBuf),
    Memory,
}

/// The enriched fact table shared by every dashboard view.
///
/// Immutable once built; the cache hands out `Arc<PreparedDataset>`.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedDataset {
    pub rows: Vec<PreparedRow>,
    pub source: SourceKind,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
    /// Keys that had no dimension entry and were labeled with the raw key.
    pub unlabeled_keys: Vec<(Dimension, String)>,
}

impl PreparedDataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn month_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        month_range(&self.rows)
    }
}

/// Key -> display label lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionTable {
    labels: HashMap<String, String>,
}

impl DimensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping. Returns `false` when the key was already present
    /// (the first label wins).
    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) -> bool {
        let key = key.into();
        if self.labels.contains_key(&key) {
            return false;
        }
        self.labels.insert(key, label.into());
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DimensionTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = DimensionTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

/// Which label dimension to group or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Brand,
    Country,
}

impl Dimension {
    pub fn display_name(self) -> &'static str {
        match self {
            Dimension::Brand => "Brand",
            Dimension::Country => "Country",
        }
    }
}

/// Additive metric columns that period comparisons can sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MetricColumn {
    Revenue,
    Units,
    OnlineRevenue,
    OfflineRevenue,
}

impl MetricColumn {
    pub fn value(self, row: &PreparedRow) -> Option<f64> {
        match self {
            MetricColumn::Revenue => row.revenue,
            MetricColumn::Units => row.units,
            MetricColumn::OnlineRevenue => row.online_revenue,
            MetricColumn::OfflineRevenue => row.offline_revenue,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MetricColumn::Revenue => "Revenue",
            MetricColumn::Units => "Units",
            MetricColumn::OnlineRevenue => "Online revenue",
            MetricColumn::OfflineRevenue => "Offline revenue",
        }
    }
}

/// A user selection over the prepared dataset.
///
/// Brand and country sets use empty-means-all. The year set is optional:
/// `None` means all years, while `Some(empty)` selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub years: Option<BTreeSet<i32>>,
    pub brands: BTreeSet<String>,
    pub countries: BTreeSet<String>,
}

/// The selection actually applied, with defaults substituted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveSelection {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub years: BTreeSet<i32>,
    pub brands: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub rows_matched: usize,
}

/// Rows of the prepared dataset that passed a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredView {
    pub rows: Vec<PreparedRow>,
}

impl FilteredView {
    pub fn new(rows: Vec<PreparedRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Headline KPIs over a filtered view.
///
/// `None` means "not available" and must be rendered as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub revenue_total: f64,
    pub units_total: f64,
    pub average_order_value: Option<f64>,
    /// `true` when the AOV is the mean of the `aov` column rather than revenue/units.
    pub aov_from_column: bool,
    pub average_margin: Option<f64>,
    pub online_share: Option<f64>,
    pub row_count: usize,
}

/// Year-to-date comparison, like-for-like on month numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearToDate {
    pub year: i32,
    pub through_month: u32,
    pub ytd_current: f64,
    pub ytd_prior: f64,
    pub ytd_yoy: Option<f64>,
}

/// Aggregates for one label in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRow {
    pub label: String,
    pub revenue: f64,
    pub units: f64,
    pub margin_avg: Option<f64>,
    pub online_revenue: f64,
    pub offline_revenue: f64,
    pub online_share: Option<f64>,
}

/// Revenue growth of one label between two consecutive years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupYoy {
    pub label: String,
    pub revenue_prior: Option<f64>,
    pub revenue_current: f64,
    pub yoy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Year,
    Month,
}

/// Online/offline revenue for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPeriod {
    pub period: String,
    pub online_revenue: f64,
    pub offline_revenue: f64,
}

/// Which path produced a forecast series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Additive trend + yearly seasonality, projected forward.
    AdditiveSeasonal,
    /// Trailing moving average over history only (no future months).
    MovingAverage,
}

impl ForecastMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            ForecastMethod::AdditiveSeasonal => "additive seasonal",
            ForecastMethod::MovingAverage => "moving average (fallback)",
        }
    }
}

/// One month of a forecast series.
///
/// For the moving-average fallback, `lower == upper == point`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub month: NaiveDate,
    pub actual: Option<f64>,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A monthly forecast covering the fit period plus the requested horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
    pub last_actual: NaiveDate,
    pub horizon_months: usize,
    /// Why the primary model was not used (fallback only).
    pub fallback_reason: Option<String>,
    /// Fourier order retained by model selection (primary only).
    pub seasonality_order: Option<usize>,
}

impl ForecastSeries {
    pub fn future(&self) -> impl Iterator<Item = &ForecastPoint> {
        let last = self.last_actual;
        self.points.iter().filter(move |p| p.month > last)
    }
}

/// How far to project a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizonSpec {
    Months(usize),
    Years(usize),
    /// Project until the given calendar year.
    UntilYear(i32),
}

/// Correlation of one signal topic against revenue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub topic: String,
    /// `None` when the overlap is too short or a side has zero variance.
    pub coefficient: Option<f64>,
    pub observations: usize,
}

/// A raw signal table with its original column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// `(first month, last month)` over a set of rows.
pub fn month_range(rows: &[PreparedRow]) -> Option<(NaiveDate, NaiveDate)> {
    let min = rows.iter().map(|r| r.month).min()?;
    let max = rows.iter().map(|r| r.month).max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepared_row_derives_calendar_columns() {
        let fact = FactRow {
            month: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            brand_key: "1".into(),
            country_key: "FR".into(),
            revenue: Some(10.0),
            units: None,
            aov: None,
            margin_pct: None,
            online_revenue: None,
            offline_revenue: None,
        };
        let row = PreparedRow::from_fact(fact, "Dior".into(), "France".into());
        assert_eq!(row.year, 2024);
        assert_eq!(row.month_number, 8);
        assert_eq!(row.quarter, 3);
        assert_eq!(row.month_label, "2024-08");
    }

    #[test]
    fn dimension_table_keeps_first_label() {
        let mut dim = DimensionTable::new();
        assert!(dim.insert("1", "Dior"));
        assert!(!dim.insert("1", "Other"));
        assert_eq!(dim.get("1"), Some("Dior"));
        assert_eq!(dim.get("2"), None);
    }
}
