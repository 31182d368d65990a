//! Basis functions for the additive trend + seasonality model.
//!
//! - Trend: an intercept, a linear term and hinge functions
//!   `h_c(t) = max(0, t - c)` at each changepoint `c`, so the slope may bend
//!   at `c` by the hinge coefficient.
//! - Yearly seasonality: Fourier pairs `sin(2πk·s/P)`, `cos(2πk·s/P)` for
//!   `k = 1..=order`, with `s` the month position and `P = 12`.

use std::f64::consts::PI;

/// Months in one seasonal period.
pub const YEARLY_PERIOD: f64 = 12.0;

/// Hinge basis `max(0, t - c)`.
pub fn hinge(t: f64, changepoint: f64) -> f64 {
    (t - changepoint).max(0.0)
}

/// Fourier terms for a period, interleaved as `[sin_1, cos_1, sin_2, cos_2, ...]`.
pub fn fourier_terms(position: f64, period: f64, order: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * position / period;
        out.push(angle.sin());
        out.push(angle.cos());
    }
    out
}

/// Evenly spaced changepoint locations over the first `range` share of `[0, 1]`.
///
/// Locations are taken from the observation grid `t` so every hinge starts on
/// an actual point; the first point is never a changepoint.
pub fn changepoint_grid(t: &[f64], max_changepoints: usize, range: f64) -> Vec<f64> {
    let n = t.len();
    if n < 3 || max_changepoints == 0 {
        return Vec::new();
    }
    let limit = ((n as f64 * range).floor() as usize).clamp(1, n - 1);
    let count = max_changepoints.min(limit.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let mut out: Vec<f64> = (1..=count)
        .map(|i| {
            let idx = (i as f64 * limit as f64 / (count + 1) as f64).round() as usize;
            t[idx.clamp(1, limit)]
        })
        .collect();
    out.dedup();
    out
}
