//! Additive trend + yearly seasonality model.
//!
//! ```text
//! y(t) = β0 + β1·t + Σ δ_c·max(0, t - c) + Σ_k (a_k·sin(2πk·s/12) + b_k·cos(2πk·s/12))
//! ```
//!
//! `t` is the month offset scaled to `[0, 1]`, `s` is the calendar month
//! position, and `y` is scaled by its largest magnitude before fitting.
//!
//! The changepoint slopes `δ_c` carry a ridge penalty of `(1 / sensitivity)²`:
//! a larger sensitivity lets the trend bend more readily. Seasonal
//! coefficients get a light fixed penalty. For a fixed Fourier order the
//! problem is linear, so each candidate order is one penalised least squares
//! solve; candidates are evaluated in parallel and the lowest BIC wins.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{AppError, AppResult};
use crate::math::{YEARLY_PERIOD, changepoint_grid, fourier_terms, hinge, solve_ridge, sse};

/// Observations required beyond the unpenalised parameter count.
const MIN_N_BUFFER: usize = 3;

/// Knobs for the seasonal model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Trend flexibility; must be positive.
    pub sensitivity: f64,
    /// Share of the history (from the start) where changepoints may sit.
    pub changepoint_range: f64,
    pub max_changepoints: usize,
    /// Ridge penalty on the Fourier coefficients.
    pub seasonality_penalty: f64,
    /// Candidate Fourier orders.
    pub orders: Vec<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.10,
            changepoint_range: 0.8,
            max_changepoints: 25,
            seasonality_penalty: 0.01,
            orders: vec![1, 2, 3, 4, 5],
        }
    }
}

/// A fitted model, able to predict at any month offset from the first observation.
#[derive(Debug, Clone)]
pub struct SeasonalFit {
    pub order: usize,
    pub changepoints: Vec<f64>,
    beta: DVector<f64>,
    /// Calendar position (0 = January) of the first observation.
    phase: f64,
    /// Month offset of the last observation (`t = 1`).
    span: f64,
    y_scale: f64,
    /// In-sample residual standard deviation, original units.
    pub sigma: f64,
    /// Average absolute trend change per month, original units.
    pub trend_drift: f64,
    pub bic: f64,
}

impl SeasonalFit {
    /// Point prediction at `offset` months from the first observation.
    pub fn predict(&self, offset: i32) -> f64 {
        let row = design_row(f64::from(offset), self.phase, self.span, &self.changepoints, self.order);
        let scaled: f64 = row.iter().zip(self.beta.iter()).map(|(x, b)| x * b).sum();
        scaled * self.y_scale
    }

    /// Half-width of the uncertainty band `steps_ahead` months past the last observation.
    pub fn band_half_width(&self, steps_ahead: usize, z: f64) -> f64 {
        let drift = self.trend_drift * steps_ahead as f64;
        z * (self.sigma * self.sigma + drift * drift).sqrt()
    }
}

/// Fit the model on `(offset, value)` pairs.
///
/// `offsets` are month offsets from the first observation (strictly
/// increasing, starting at 0); `first_month0` is its calendar month (0-based).
pub fn fit_seasonal(offsets: &[i32], values: &[f64], first_month0: u32, config: &ModelConfig) -> AppResult<SeasonalFit> {
    let n = values.len();
    if offsets.len() != n || n < 3 {
        return Err(AppError::ModelFit(format!("cannot fit {n} observations")));
    }
    if !(config.sensitivity.is_finite() && config.sensitivity > 0.0) {
        return Err(AppError::ModelFit(format!("invalid sensitivity {}", config.sensitivity)));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::ModelFit("non-finite value in series".into()));
    }

    let span = f64::from(offsets[n - 1].max(1));
    let y_scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

    let t: Vec<f64> = offsets.iter().map(|o| f64::from(*o) / span).collect();
    let changepoints = changepoint_grid(&t, config.max_changepoints, config.changepoint_range);
    let y = DVector::from_iterator(n, values.iter().map(|v| v / y_scale));
    let phase = f64::from(first_month0);

    let candidates: Vec<SeasonalFit> = config
        .orders
        .par_iter()
        .filter(|order| **order > 0 && n >= 2 + 2 * **order + MIN_N_BUFFER)
        .filter_map(|&order| {
            let fitted = fit_order(offsets, &y, phase, span, y_scale, &changepoints, order, config);
            if fitted.is_none() {
                log::debug!("forecast: Fourier order {order} did not solve");
            }
            fitted
        })
        .collect();

    // Lowest BIC; ties go to the simpler model.
    candidates
        .into_iter()
        .min_by(|a, b| a.bic.total_cmp(&b.bic).then(a.order.cmp(&b.order)))
        .ok_or_else(|| AppError::ModelFit(format!("no Fourier order could be fitted on {n} points")))
}

#[allow(clippy::too_many_arguments)]
fn fit_order(
    offsets: &[i32],
    y: &DVector<f64>,
    phase: f64,
    span: f64,
    y_scale: f64,
    changepoints: &[f64],
    order: usize,
    config: &ModelConfig,
) -> Option<SeasonalFit> {
    let n = y.len();
    let p = 2 + changepoints.len() + 2 * order;

    let mut x = DMatrix::<f64>::zeros(n, p);
    for (i, offset) in offsets.iter().enumerate() {
        let row = design_row(f64::from(*offset), phase, span, changepoints, order);
        for (j, v) in row.into_iter().enumerate() {
            x[(i, j)] = v;
        }
    }

    let cp_penalty = (1.0 / config.sensitivity).powi(2);
    let mut penalties = vec![0.0; 2];
    penalties.extend(std::iter::repeat_n(cp_penalty, changepoints.len()));
    penalties.extend(std::iter::repeat_n(config.seasonality_penalty, 2 * order));

    let beta = solve_ridge(&x, y, &penalties)?;
    let sse_scaled = sse(&x, y, &beta);
    if !sse_scaled.is_finite() {
        return None;
    }

    let deltas = &beta.as_slice()[2..2 + changepoints.len()];
    let mean_delta = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64
    };

    Some(SeasonalFit {
        order,
        changepoints: changepoints.to_vec(),
        beta,
        phase,
        span,
        y_scale,
        sigma: (sse_scaled / n as f64).sqrt() * y_scale,
        trend_drift: mean_delta * y_scale / span,
        bic: bic(n, sse_scaled, 2 + 2 * order),
    })
}

fn design_row(offset: f64, phase: f64, span: f64, changepoints: &[f64], order: usize) -> Vec<f64> {
    let t = offset / span;
    let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * order);
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|c| hinge(t, *c)));
    row.extend(fourier_terms(offset + phase, YEARLY_PERIOD, order));
    row
}

fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-12);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}
