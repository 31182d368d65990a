//! Synthetic luxury-retail dataset generation.
//!
//! Produces a monthly fact table (brands × countries × months) with a
//! per-pair growth trend, a December-peaking yearly cycle, and lognormal
//! noise, together with the two dimension tables and a weekly search-interest
//! signal per brand. The generator is fully determined by the seed.

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{DimensionTable, FactRow, SignalTable, add_months, first_of_month};
use crate::error::{AppError, AppResult};

/// Knobs for `generate_sample`.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub seed: u64,
    pub start: NaiveDate,
    pub months: usize,
    pub brands: Vec<(String, String)>,
    pub countries: Vec<(String, String)>,
    /// Log-scale noise on monthly revenue.
    pub noise: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };
        Self {
            seed: 42,
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            months: 84,
            brands: pairs(&[("LV", "Louis Vuitton"), ("DIOR", "Dior"), ("HERMES", "Hermès"), ("GUCCI", "Gucci")]),
            countries: pairs(&[("FR", "France"), ("US", "United States"), ("CN", "China"), ("JP", "Japan")]),
            noise: 0.08,
        }
    }
}

/// A generated dataset, ready to be written as CSV or enriched in memory.
#[derive(Debug, Clone)]
pub struct SampleData {
    pub facts: Vec<FactRow>,
    pub brands: Vec<(String, String)>,
    pub countries: Vec<(String, String)>,
    pub signals: SignalTable,
}

impl SampleData {
    pub fn brand_table(&self) -> DimensionTable {
        self.brands.iter().cloned().collect()
    }

    pub fn country_table(&self) -> DimensionTable {
        self.countries.iter().cloned().collect()
    }
}

pub fn generate_sample(config: &SampleConfig) -> AppResult<SampleData> {
    if config.months == 0 {
        return Err(AppError::Config("Sample must cover at least one month.".into()));
    }
    if config.brands.is_empty() || config.countries.is_empty() {
        return Err(AppError::Config("Sample needs at least one brand and one country.".into()));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::Config(format!("Invalid sample noise {}", config.noise)));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::Config(format!("Noise distribution error: {e}")))?;
    let start = first_of_month(config.start);

    let mut facts = Vec::with_capacity(config.months * config.brands.len() * config.countries.len());

    for (brand_key, _) in &config.brands {
        let brand_level = rng.gen_range(50_000.0..200_000.0);
        let brand_aov = rng.gen_range(800.0..2_500.0);
        let brand_margin = rng.gen_range(45.0..68.0);

        for (country_key, _) in &config.countries {
            let country_weight = rng.gen_range(0.4..1.6);
            let annual_growth: f64 = rng.gen_range(0.0..0.12);
            let online_base = rng.gen_range(0.12..0.25);

            for i in 0..config.months {
                let month = add_months(start, i as i32);
                let years = i as f64 / 12.0;
                let revenue = brand_level
                    * country_weight
                    * (1.0 + annual_growth).powf(years)
                    * seasonal_factor(month)
                    * noise.sample(&mut rng).exp();
                let revenue = revenue.round();

                let aov = brand_aov * (1.0 + noise.sample(&mut rng) / 2.0);
                let units = (revenue / aov).round().max(1.0);
                let online_share = (online_base + 0.015 * years).min(0.6);
                let online = (revenue * online_share).round();

                facts.push(FactRow {
                    month,
                    brand_key: brand_key.clone(),
                    country_key: country_key.clone(),
                    revenue: Some(revenue),
                    units: Some(units),
                    aov: Some((revenue / units * 100.0).round() / 100.0),
                    margin_pct: Some(((brand_margin + rng.gen_range(-3.0..3.0)) * 100.0_f64).round() / 100.0),
                    online_revenue: Some(online),
                    offline_revenue: Some(revenue - online),
                });
            }
        }
    }

    let signals = generate_signals(&mut rng, config, start, &noise);

    Ok(SampleData {
        facts,
        brands: config.brands.clone(),
        countries: config.countries.clone(),
        signals,
    })
}

/// Weekly 0–100 interest index per brand label, sharing the revenue cycle.
fn generate_signals(rng: &mut StdRng, config: &SampleConfig, start: NaiveDate, noise: &Normal<f64>) -> SignalTable {
    let end = add_months(start, config.months as i32);
    let mut rows = Vec::new();

    for (_, label) in &config.brands {
        let level = rng.gen_range(35.0..65.0);
        let mut day = start;
        while day < end {
            let score = level * seasonal_factor(day) * (1.0 + noise.sample(rng));
            rows.push(vec![
                day.format("%Y-%m-%d").to_string(),
                label.clone(),
                format!("{:.0}", score.clamp(0.0, 100.0)),
            ]);
            day += Duration::days(7);
        }
    }

    SignalTable {
        columns: vec!["date".into(), "topic".into(), "score".into()],
        rows,
    }
}

/// Yearly cycle peaking in December.
fn seasonal_factor(date: NaiveDate) -> f64 {
    let phase = 2.0 * PI * (date.month() as f64 - 12.0) / 12.0;
    1.0 + 0.25 * phase.cos()
}
