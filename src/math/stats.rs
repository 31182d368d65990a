//! Summary statistics on plain slices.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Pearson correlation coefficient.
///
/// `None` when the slices differ in length, hold fewer than two points, or
/// either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if !(denom.is_finite() && denom > 0.0) {
        return None;
    }
    let r = (sxy / denom).clamp(-1.0, 1.0);
    r.is_finite().then_some(r)
}

/// Standard scores. A constant series maps to all zeros.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let (Some(m), Some(sd)) = (mean(values), std_dev(values)) else {
        return Vec::new();
    };
    if sd == 0.0 || !sd.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - m) / sd).collect()
}

/// Mean of the trailing `window` values (fewer if the slice is shorter).
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    let window = window.max(1).min(values.len());
    mean(&values[values.len() - window..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_detects_perfect_relationships() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = [10.0, 20.0, 30.0, 40.0];
        let down = [4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &down).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_undefined_cases() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn zscore_of_constant_is_zero() {
        assert_eq!(zscore(&[5.0, 5.0]), vec![0.0, 0.0]);
        let z = zscore(&[1.0, 3.0]);
        assert!((z[0] + 1.0).abs() < 1e-12 && (z[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn trailing_mean_uses_available_points() {
        assert_eq!(trailing_mean(&[], 6), None);
        assert_eq!(trailing_mean(&[2.0, 4.0], 6), Some(3.0));
        assert_eq!(trailing_mean(&[100.0, 1.0, 3.0], 2), Some(2.0));
    }
}
