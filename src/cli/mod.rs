//! Command-line parsing for the `lbi` analytics tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! data access and the metric/forecast engines.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{Dimension, FilterSelection, Granularity, HorizonSpec, first_of_month};
use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lbi", version, about = "Luxury retail BI: KPIs, rankings, forecasts and signal correlation")]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Headline KPIs, year-to-date comparison and growth figures.
    Kpi(KpiArgs),
    /// Rank brands or countries by revenue.
    Rank(RankArgs),
    /// Forecast monthly revenue.
    Forecast(ForecastArgs),
    /// Correlate external interest signals with monthly revenue.
    Correlate(CorrelateArgs),
    /// Advisory data-quality report.
    Quality(QualityArgs),
    /// Write a deterministic synthetic dataset as CSV files.
    Sample(SampleArgs),
}

/// Source overrides; unset flags fall back to the environment.
#[derive(Debug, Args, Clone, Default)]
pub struct SourceArgs {
    /// Primary database (SQLite path or `sqlite://` URL). Overrides DATABASE_URL.
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// Fallback fact CSV. Overrides LBI_FACTS_CSV.
    #[arg(long, global = true, value_name = "CSV")]
    pub facts: Option<PathBuf>,

    /// Brand dimension CSV. Overrides LBI_BRANDS_CSV.
    #[arg(long, global = true, value_name = "CSV")]
    pub brands_csv: Option<PathBuf>,

    /// Country dimension CSV. Overrides LBI_COUNTRIES_CSV.
    #[arg(long, global = true, value_name = "CSV")]
    pub countries_csv: Option<PathBuf>,

    /// Signal CSV (date, topic, score). Overrides LBI_SIGNALS_CSV.
    #[arg(long, global = true, value_name = "CSV")]
    pub signals: Option<PathBuf>,

    /// Never attempt the database.
    #[arg(long, global = true)]
    pub force_fallback: bool,
}

/// Row selection shared by the analytics commands.
#[derive(Debug, Args, Clone, Default)]
pub struct FilterArgs {
    /// First month to include (YYYY-MM or a full date).
    #[arg(long, value_parser = parse_month)]
    pub from: Option<NaiveDate>,

    /// Last month to include (YYYY-MM or a full date).
    #[arg(long, value_parser = parse_month)]
    pub to: Option<NaiveDate>,

    /// Restrict to these years (repeatable or comma-separated).
    #[arg(long = "year", value_delimiter = ',')]
    pub years: Vec<i32>,

    /// Restrict to these brand labels (repeatable or comma-separated).
    #[arg(long = "brand", value_delimiter = ',')]
    pub brands: Vec<String>,

    /// Restrict to these country labels (repeatable or comma-separated).
    #[arg(long = "country", value_delimiter = ',')]
    pub countries: Vec<String>,
}

impl FilterArgs {
    /// An unset `--year` means all years.
    pub fn selection(&self) -> FilterSelection {
        FilterSelection {
            from: self.from,
            to: self.to,
            years: (!self.years.is_empty()).then(|| self.years.iter().copied().collect::<BTreeSet<_>>()),
            brands: self.brands.iter().cloned().collect(),
            countries: self.countries.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct KpiArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Also print the online/offline split per year or month.
    #[arg(long, value_enum)]
    pub channels: Option<Granularity>,

    /// Write the KPI set as JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Dimension to rank.
    #[arg(long, value_enum, default_value_t = Dimension::Brand)]
    pub by: Dimension,

    /// Show top-N labels.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Also show per-label YoY for this year against the year before.
    #[arg(long, value_name = "YEAR")]
    pub yoy_year: Option<i32>,

    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Months to project past the last actual month.
    #[arg(long, conflicts_with_all = ["horizon_years", "until_year"])]
    pub months: Option<usize>,

    /// Years to project past the last actual month.
    #[arg(long = "years", conflicts_with = "until_year")]
    pub horizon_years: Option<usize>,

    /// Project until January of this year.
    #[arg(long, value_name = "YEAR")]
    pub until_year: Option<i32>,

    /// Trend flexibility (higher bends more readily).
    #[arg(long, default_value_t = crate::forecast::DEFAULT_SENSITIVITY)]
    pub sensitivity: f64,

    /// Skip the seasonal model and use the moving average.
    #[arg(long)]
    pub no_model: bool,

    /// Give up on the seasonal model after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Moving-average window (months) for the fallback.
    #[arg(long, default_value_t = crate::forecast::DEFAULT_MA_WINDOW)]
    pub ma_window: usize,

    /// Export the forecast series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl ForecastArgs {
    pub fn horizon(&self) -> HorizonSpec {
        match (self.months, self.horizon_years, self.until_year) {
            (Some(m), _, _) => HorizonSpec::Months(m),
            (None, Some(y), _) => HorizonSpec::Years(y),
            (None, None, Some(year)) => HorizonSpec::UntilYear(year),
            (None, None, None) => HorizonSpec::Months(crate::forecast::DEFAULT_HORIZON_MONTHS),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Correlate raw values instead of z-scores.
    #[arg(long)]
    pub raw: bool,

    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct QualityArgs {
    /// Relative tolerance for online + offline vs revenue.
    #[arg(long, default_value_t = crate::data::quality::DEFAULT_CHANNEL_TOLERANCE)]
    pub tolerance: f64,

    /// Maximum findings to print.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output directory.
    #[arg(long, default_value = "data/processed")]
    pub out: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of months to generate.
    #[arg(long, default_value_t = 84)]
    pub months: usize,

    /// First month (YYYY-MM).
    #[arg(long, value_parser = parse_month)]
    pub start: Option<NaiveDate>,
}

fn parse_month(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw)
        .map(first_of_month)
        .ok_or_else(|| format!("'{raw}' is not a month (expected YYYY-MM or YYYY-MM-DD)"))
}
