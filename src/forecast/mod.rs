//! Monthly revenue forecasting.
//!
//! One call, one result:
//!
//! 1. reject series shorter than `MIN_HISTORY` months (`InsufficientHistory`)
//! 2. fit the additive seasonal model and project `horizon` months ahead
//! 3. on any fit failure, timeout, or non-finite output, fall back to a
//!    trailing moving average over the history (no future months)
//!
//! `ModelFit` errors never leave this module.

pub mod model;

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use crate::domain::{ForecastMethod, ForecastPoint, ForecastSeries, HorizonSpec, add_months, months_between};
use crate::error::{AppError, AppResult};
use crate::math::trailing_mean;

pub use model::{ModelConfig, SeasonalFit, fit_seasonal};

/// Shortest history the engine accepts.
pub const MIN_HISTORY: usize = 12;
pub const DEFAULT_SENSITIVITY: f64 = 0.10;
pub const DEFAULT_MA_WINDOW: usize = 6;
pub const DEFAULT_HORIZON_MONTHS: usize = 12;

/// z-score of the symmetric band (80% interval).
const INTERVAL_Z: f64 = 1.2816;

/// Options for one forecast call.
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    pub horizon: HorizonSpec,
    /// Trend flexibility of the primary model.
    pub sensitivity: f64,
    /// When `false`, go straight to the moving-average fallback.
    pub use_model: bool,
    /// Upper bound on model fitting; a timeout counts as a fit failure.
    pub fit_timeout: Option<Duration>,
    pub ma_window: usize,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon: HorizonSpec::Months(DEFAULT_HORIZON_MONTHS),
            sensitivity: DEFAULT_SENSITIVITY,
            use_model: true,
            fit_timeout: None,
            ma_window: DEFAULT_MA_WINDOW,
        }
    }
}

impl HorizonSpec {
    /// Number of months to project past `last_actual`.
    ///
    /// `UntilYear(y)` runs to January of `y` and is at least one month.
    pub fn months_after(self, last_actual: NaiveDate) -> usize {
        match self {
            HorizonSpec::Months(n) => n,
            HorizonSpec::Years(n) => n * 12,
            HorizonSpec::UntilYear(year) => {
                let months = (year - last_actual.year()) * 12 - last_actual.month0() as i32;
                months.max(1) as usize
            }
        }
    }
}

/// Forecast a monthly series.
///
/// `history` must hold one value per month in increasing order; gaps are
/// allowed. Only configuration problems and a too-short history are errors.
pub fn forecast(history: &[(NaiveDate, f64)], options: &ForecastOptions) -> AppResult<ForecastSeries> {
    validate(history, options)?;

    let (first, _) = history[0];
    let (last, _) = history[history.len() - 1];
    let horizon_months = options.horizon.months_after(last);
    if horizon_months == 0 {
        return Err(AppError::Config("Forecast horizon must be at least one month.".into()));
    }

    if !options.use_model {
        return Ok(moving_average(history, options.ma_window, "forecast model disabled".into()));
    }

    let offsets: Vec<i32> = history.iter().map(|(m, _)| months_between(first, *m)).collect();
    let values: Vec<f64> = history.iter().map(|(_, v)| *v).collect();
    let config = ModelConfig {
        sensitivity: options.sensitivity,
        ..ModelConfig::default()
    };

    let fitted = run_with_timeout(options.fit_timeout, {
        let offsets = offsets.clone();
        let values = values.clone();
        move || fit_seasonal(&offsets, &values, first.month0(), &config)
    })
    .and_then(|fit| project(history, &offsets, &fit, horizon_months));

    match fitted {
        Ok(series) => {
            log::info!(
                "forecast: additive model (Fourier order {:?}) over {} months, {horizon_months} ahead",
                series.seasonality_order,
                history.len()
            );
            Ok(series)
        }
        Err(err) => {
            log::warn!("forecast: primary model unavailable, using moving average: {err}");
            Ok(moving_average(history, options.ma_window, err.to_string()))
        }
    }
}

fn validate(history: &[(NaiveDate, f64)], options: &ForecastOptions) -> AppResult<()> {
    if history.len() < MIN_HISTORY {
        return Err(AppError::InsufficientHistory {
            needed: MIN_HISTORY,
            got: history.len(),
        });
    }
    if !(options.sensitivity.is_finite() && options.sensitivity > 0.0) {
        return Err(AppError::Config(format!(
            "Forecast sensitivity must be positive, got {}",
            options.sensitivity
        )));
    }
    if options.ma_window == 0 {
        return Err(AppError::Config("Moving-average window must be at least 1.".into()));
    }
    if let Some(pair) = history.windows(2).find(|w| w[1].0 <= w[0].0) {
        return Err(AppError::SchemaMismatch(format!(
            "Series months must be strictly increasing ({} follows {})",
            pair[1].0, pair[0].0
        )));
    }
    if let Some((month, _)) = history.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AppError::SchemaMismatch(format!("Non-finite value in series at {month}")));
    }
    Ok(())
}

fn project(
    history: &[(NaiveDate, f64)],
    offsets: &[i32],
    fit: &SeasonalFit,
    horizon_months: usize,
) -> AppResult<ForecastSeries> {
    let in_sample = fit.band_half_width(0, INTERVAL_Z);
    let mut points: Vec<ForecastPoint> = history
        .iter()
        .zip(offsets)
        .map(|((month, actual), offset)| {
            let point = fit.predict(*offset);
            ForecastPoint {
                month: *month,
                actual: Some(*actual),
                point,
                lower: point - in_sample,
                upper: point + in_sample,
            }
        })
        .collect();

    let last_offset = offsets[offsets.len() - 1];
    let (last, _) = history[history.len() - 1];
    for step in 1..=horizon_months {
        let point = fit.predict(last_offset + step as i32);
        let half = fit.band_half_width(step, INTERVAL_Z);
        points.push(ForecastPoint {
            month: add_months(last, step as i32),
            actual: None,
            point,
            lower: point - half,
            upper: point + half,
        });
    }

    if let Some(bad) = points
        .iter()
        .find(|p| !(p.point.is_finite() && p.lower.is_finite() && p.upper.is_finite()))
    {
        return Err(AppError::ModelFit(format!("non-finite prediction at {}", bad.month)));
    }

    Ok(ForecastSeries {
        method: ForecastMethod::AdditiveSeasonal,
        points,
        last_actual: last,
        horizon_months,
        fallback_reason: None,
        seasonality_order: Some(fit.order),
    })
}

/// Trailing moving average over the history only.
///
/// Each point averages up to `window` values ending at that month. The band
/// collapses onto the point and no future months are produced.
pub fn moving_average(history: &[(NaiveDate, f64)], window: usize, reason: String) -> ForecastSeries {
    let values: Vec<f64> = history.iter().map(|(_, v)| *v).collect();
    let points = history
        .iter()
        .enumerate()
        .filter_map(|(i, (month, actual))| {
            let point = trailing_mean(&values[..=i], window)?;
            Some(ForecastPoint {
                month: *month,
                actual: Some(*actual),
                point,
                lower: point,
                upper: point,
            })
        })
        .collect();

    ForecastSeries {
        method: ForecastMethod::MovingAverage,
        points,
        last_actual: history.last().map(|(m, _)| *m).unwrap_or_default(),
        horizon_months: 0,
        fallback_reason: Some(reason),
        seasonality_order: None,
    }
}

/// Run `job` on a worker thread, giving up after `limit`.
///
/// A timed-out worker is detached; its result is discarded.
fn run_with_timeout<T, F>(limit: Option<Duration>, job: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    let Some(limit) = limit else {
        return job();
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(job());
    });

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(AppError::ModelFit(format!("fit exceeded {} ms", limit.as_millis()))),
        Err(RecvTimeoutError::Disconnected) => Err(AppError::ModelFit("fit worker stopped unexpectedly".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn series(n: usize, f: impl Fn(usize) -> f64) -> Vec<(NaiveDate, f64)> {
        (0..n).map(|i| (add_months(ym(2021, 1), i as i32), f(i))).collect()
    }

    fn seasonal(i: usize) -> f64 {
        5000.0 + 25.0 * i as f64 + 600.0 * (2.0 * PI * i as f64 / 12.0).cos()
    }

    #[test]
    fn eleven_points_is_insufficient() {
        let err = forecast(&series(11, seasonal), &ForecastOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientHistory { needed: 12, got: 11 }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn twelve_points_use_the_primary_model() {
        let out = forecast(&series(12, seasonal), &ForecastOptions::default()).unwrap();
        assert_eq!(out.method, ForecastMethod::AdditiveSeasonal);
        assert_eq!(out.points.len(), 12 + DEFAULT_HORIZON_MONTHS);
        assert_eq!(out.future().count(), DEFAULT_HORIZON_MONTHS);
        assert!(out.fallback_reason.is_none());
    }

    #[test]
    fn primary_series_is_ordered_with_symmetric_band() {
        let opts = ForecastOptions {
            horizon: HorizonSpec::Years(2),
            ..ForecastOptions::default()
        };
        let out = forecast(&series(36, seasonal), &opts).unwrap();
        assert_eq!(out.horizon_months, 24);
        assert!(out.points.windows(2).all(|w| w[0].month < w[1].month));
        for p in &out.points {
            assert!(p.lower <= p.point && p.point <= p.upper);
            assert!(((p.upper - p.point) - (p.point - p.lower)).abs() < 1e-6);
        }
        let first_future = out.future().next().unwrap();
        assert_eq!(first_future.month, ym(2024, 1));
        assert!(first_future.actual.is_none());
    }

    #[test]
    fn flat_series_fallback_is_flat() {
        let opts = ForecastOptions {
            use_model: false,
            ..ForecastOptions::default()
        };
        let out = forecast(&series(24, |_| 1000.0), &opts).unwrap();
        assert_eq!(out.method, ForecastMethod::MovingAverage);
        assert_eq!(out.points.len(), 24);
        assert_eq!(out.future().count(), 0);
        assert!(out.fallback_reason.is_some());
        for p in &out.points {
            assert!((p.point - 1000.0).abs() < 1e-9);
            assert_eq!(p.lower, p.upper);
        }
    }

    #[test]
    fn moving_average_uses_partial_windows() {
        let hist = series(4, |i| (i + 1) as f64 * 10.0);
        let out = moving_average(&hist, 2, "test".into());
        let pts: Vec<f64> = out.points.iter().map(|p| p.point).collect();
        assert_eq!(pts, vec![10.0, 15.0, 25.0, 35.0]);
    }

    #[test]
    fn timeout_degrades_to_error() {
        let slow = run_with_timeout(Some(Duration::from_millis(10)), || {
            thread::sleep(Duration::from_millis(300));
            Ok(1)
        });
        assert!(matches!(slow, Err(AppError::ModelFit(_))));

        let fast = run_with_timeout(Some(Duration::from_secs(5)), || Ok(7));
        assert_eq!(fast.unwrap(), 7);
    }

    #[test]
    fn expired_fit_falls_back_to_moving_average() {
        let opts = ForecastOptions {
            fit_timeout: Some(Duration::ZERO),
            ..ForecastOptions::default()
        };
        let out = forecast(&series(36, seasonal), &opts).unwrap();
        assert_eq!(out.method, ForecastMethod::MovingAverage);
        assert_eq!(out.horizon_months, 0);
        assert_eq!(out.future().count(), 0);
        assert_eq!(out.points.len(), 36);
        let reason = out.fallback_reason.as_deref().unwrap_or_default();
        assert!(reason.contains("exceeded"), "unexpected reason: {reason}");
    }

    #[test]
    fn horizon_conversion() {
        let last = ym(2024, 3);
        assert_eq!(HorizonSpec::Months(5).months_after(last), 5);
        assert_eq!(HorizonSpec::Years(2).months_after(last), 24);
        assert_eq!(HorizonSpec::UntilYear(2026).months_after(last), 22);
        assert_eq!(HorizonSpec::UntilYear(2024).months_after(last), 1);
    }

    #[test]
    fn rejects_unordered_series() {
        let mut hist = series(12, seasonal);
        hist.swap(3, 4);
        assert!(matches!(
            forecast(&hist, &ForecastOptions::default()),
            Err(AppError::SchemaMismatch(_))
        ));
    }
}
