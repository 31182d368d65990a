//! Export results to CSV and JSON.
//!
//! Exports are meant to be easy to consume in spreadsheets or by the
//! presentation layer; column names match the source system where one exists.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::sample::SampleData;
use crate::domain::{FactRow, ForecastSeries};
use crate::error::{AppError, AppResult};

#[derive(Serialize)]
struct ForecastRecord<'a> {
    month: String,
    actual: Option<f64>,
    point: f64,
    lower: f64,
    upper: f64,
    is_forecast: bool,
    method: &'a str,
}

/// Write a forecast series as CSV (one row per month).
pub fn write_forecast_csv(path: &Path, series: &ForecastSeries) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| export_error(path, e))?;
    let method = series.method.display_name();
    for p in &series.points {
        writer.serialize(ForecastRecord {
            month: p.month.format("%Y-%m-%d").to_string(),
            actual: p.actual,
            point: p.point,
            lower: p.lower,
            upper: p.upper,
            is_forecast: p.month > series.last_actual,
            method,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write any serializable result as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let file = File::create(path).map_err(|e| export_error(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Fact row laid out with the source system's column names.
#[derive(Serialize)]
struct FactRecord<'a> {
    month_key: String,
    marque_key: &'a str,
    pays_key: &'a str,
    ca: Option<f64>,
    unites: Option<f64>,
    aov: Option<f64>,
    marge_pct_avg: Option<f64>,
    ca_online: Option<f64>,
    ca_offline: Option<f64>,
}

impl<'a> From<&'a FactRow> for FactRecord<'a> {
    fn from(f: &'a FactRow) -> Self {
        Self {
            month_key: f.month.format("%Y-%m-%d").to_string(),
            marque_key: &f.brand_key,
            pays_key: &f.country_key,
            ca: f.revenue,
            unites: f.units,
            aov: f.aov,
            marge_pct_avg: f.margin_pct,
            ca_online: f.online_revenue,
            ca_offline: f.offline_revenue,
        }
    }
}

/// Files written by `write_sample`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFiles {
    pub facts: PathBuf,
    pub brands: PathBuf,
    pub countries: PathBuf,
    pub signals: PathBuf,
}

/// Write a generated dataset as the four CSV files the file source reads.
pub fn write_sample(dir: &Path, sample: &SampleData) -> AppResult<SampleFiles> {
    fs::create_dir_all(dir)?;
    let files = SampleFiles {
        facts: dir.join("mv_month_brand_country.csv"),
        brands: dir.join("dim_marque.csv"),
        countries: dir.join("dim_pays.csv"),
        signals: dir.join("google_trends.csv"),
    };

    let mut facts = csv::Writer::from_path(&files.facts).map_err(|e| export_error(&files.facts, e))?;
    for f in &sample.facts {
        facts.serialize(FactRecord::from(f))?;
    }
    facts.flush()?;

    write_pairs(&files.brands, ["marque_key", "marque_nom"], &sample.brands)?;
    write_pairs(&files.countries, ["pays_key", "pays_nom"], &sample.countries)?;

    let mut signals = csv::Writer::from_path(&files.signals).map_err(|e| export_error(&files.signals, e))?;
    signals.write_record(&sample.signals.columns)?;
    for row in &sample.signals.rows {
        signals.write_record(row)?;
    }
    signals.flush()?;

    Ok(files)
}

fn write_pairs(path: &Path, header: [&str; 2], pairs: &[(String, String)]) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| export_error(path, e))?;
    writer.write_record(header)?;
    for (key, label) in pairs {
        writer.write_record([key, label])?;
    }
    writer.flush()?;
    Ok(())
}

fn export_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Config(format!("Failed to create export file '{}': {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CsvSource;
    use crate::data::enrich::prepare;
    use crate::data::sample::{SampleConfig, generate_sample};
    use crate::data::source::DataSource;
    use crate::data::source::tests::scratch;
    use crate::domain::{ForecastMethod, ForecastPoint};
    use crate::io::ingest::read_signal_table;
    use chrono::NaiveDate;

    #[test]
    fn sample_files_read_back_through_the_csv_source() {
        let dir = scratch("export-sample");
        let sample = generate_sample(&SampleConfig {
            months: 12,
            ..SampleConfig::default()
        })
        .unwrap();
        let files = write_sample(&dir, &sample).unwrap();

        let source = CsvSource::new(&files.facts).with_dimensions(Some(files.brands.clone()), Some(files.countries.clone()));
        let dataset = prepare(source.fetch().unwrap());
        assert_eq!(dataset.rows.len(), sample.facts.len());
        assert!(dataset.row_errors.is_empty());
        assert!(dataset.unlabeled_keys.is_empty());
        assert!(dataset.rows.iter().any(|r| r.brand == "Louis Vuitton"));

        let signals = read_signal_table(&files.signals).unwrap();
        assert_eq!(signals.rows.len(), sample.signals.rows.len());
    }

    #[test]
    fn forecast_csv_flags_future_rows() {
        let dir = scratch("export-forecast");
        let path = dir.join("forecast.csv");
        let month = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        let series = ForecastSeries {
            method: ForecastMethod::AdditiveSeasonal,
            points: vec![
                ForecastPoint {
                    month: month(1),
                    actual: Some(10.0),
                    point: 11.0,
                    lower: 9.0,
                    upper: 13.0,
                },
                ForecastPoint {
                    month: month(2),
                    actual: None,
                    point: 12.0,
                    lower: 8.0,
                    upper: 16.0,
                },
            ],
            last_actual: month(1),
            horizon_months: 1,
            fallback_reason: None,
            seasonality_order: Some(2),
        };
        write_forecast_csv(&path, &series).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "month,actual,point,lower,upper,is_forecast,method");
        assert_eq!(lines[1], "2024-01-01,10.0,11.0,9.0,13.0,false,additive seasonal");
        assert_eq!(lines[2], "2024-02-01,,12.0,8.0,16.0,true,additive seasonal");
    }
}
