//! KPI computations over a filtered view.
//!
//! Every function here is pure: same view in, same numbers out. Values that
//! cannot be computed (division by zero, empty periods) come back as `None`
//! so the presentation layer can show "not available" instead of a zero.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{
    ChannelPeriod, Dimension, FilteredView, ForecastSeries, Granularity, GroupYoy, MetricColumn, PreparedRow,
    RankRow, Totals, YearToDate, month_grid, month_range, months_between,
};
use crate::math::mean;

/// Headline totals.
///
/// AOV is `revenue / units` when units are positive. Otherwise the mean of the
/// `aov` column is used (and flagged) when that column has values.
pub fn totals(view: &FilteredView) -> Totals {
    let rows = &view.rows;
    let revenue_total = sum_present(rows, |r| r.revenue);
    let units_total = sum_present(rows, |r| r.units);

    let (average_order_value, aov_from_column) = if units_total > 0.0 {
        (ratio(revenue_total, units_total), false)
    } else {
        let aovs: Vec<f64> = rows.iter().filter_map(|r| r.aov).collect();
        match mean(&aovs) {
            Some(v) => (Some(v), true),
            None => (None, false),
        }
    };

    let margins: Vec<f64> = rows.iter().filter_map(|r| r.margin_pct).collect();

    let online = sum_present(rows, |r| r.online_revenue);
    let offline = sum_present(rows, |r| r.offline_revenue);

    Totals {
        revenue_total,
        units_total,
        average_order_value,
        aov_from_column,
        average_margin: mean(&margins),
        online_share: ratio(online, online + offline).map(|s| s * 100.0),
        row_count: rows.len(),
    }
}

/// `(current / prior - 1) × 100`, undefined when `prior` is zero or not finite.
pub fn yoy_from_sums(current: f64, prior: f64) -> Option<f64> {
    if !current.is_finite() {
        return None;
    }
    ratio(current, prior).map(|r| (r - 1.0) * 100.0)
}

/// Percentage change of `metric` between `reference_year` and the year before.
pub fn year_over_year(view: &FilteredView, metric: MetricColumn, reference_year: i32) -> Option<f64> {
    let current = sum_where(&view.rows, metric, |r| r.year == reference_year);
    let prior = sum_where(&view.rows, metric, |r| r.year == reference_year - 1);
    yoy_from_sums(current, prior)
}

/// Year-to-date comparison of the latest observed year against the prior year.
///
/// Both years are cut at the latest month-number observed in the latest year.
/// Returns `None` for an empty view.
pub fn year_to_date(view: &FilteredView, metric: MetricColumn) -> Option<YearToDate> {
    let year = view.rows.iter().map(|r| r.year).max()?;
    let through_month = view
        .rows
        .iter()
        .filter(|r| r.year == year)
        .map(|r| r.month_number)
        .max()?;

    let ytd_current = sum_where(&view.rows, metric, |r| r.year == year && r.month_number <= through_month);
    let ytd_prior = sum_where(&view.rows, metric, |r| r.year == year - 1 && r.month_number <= through_month);

    Some(YearToDate {
        year,
        through_month,
        ytd_current,
        ytd_prior,
        ytd_yoy: yoy_from_sums(ytd_current, ytd_prior),
    })
}

/// Compound annual growth in percent.
///
/// Undefined when `first <= 0`, `n_years <= 0`, or the result is not finite.
pub fn compound_growth(first: f64, last: f64, n_years: f64) -> Option<f64> {
    if !(first.is_finite() && last.is_finite() && n_years.is_finite()) || first <= 0.0 || n_years <= 0.0 {
        return None;
    }
    let growth = ((last / first).powf(1.0 / n_years) - 1.0) * 100.0;
    growth.is_finite().then_some(growth)
}

/// Revenue summed per calendar year.
pub fn annual_revenue(view: &FilteredView) -> BTreeMap<i32, f64> {
    let mut out = BTreeMap::new();
    for row in &view.rows {
        *out.entry(row.year).or_insert(0.0) += row.revenue.unwrap_or(0.0);
    }
    out
}

/// CAGR from the first to the last observed year's revenue.
pub fn historical_cagr(view: &FilteredView) -> Option<f64> {
    let annual = annual_revenue(view);
    let (&first_year, &first) = annual.first_key_value()?;
    let (&last_year, &last) = annual.last_key_value()?;
    compound_growth(first, last, f64::from(last_year - first_year))
}

/// CAGR implied by a forecast, from the last actual month to the last projected month.
///
/// `None` for a fallback series (it does not project forward).
pub fn forecast_cagr(series: &ForecastSeries) -> Option<f64> {
    let start = series.points.iter().find(|p| p.month == series.last_actual)?;
    let end = series.future().last()?;
    let months = months_between(start.month, end.month);
    let years = f64::from(months / 12) + f64::from(months % 12) / 12.0;
    compound_growth(start.point, end.point, years)
}

/// Revenue per month over a contiguous grid from the first to the last observed month.
///
/// Months inside the range with no rows are reported as zero.
pub fn monthly_revenue(view: &FilteredView) -> Vec<(NaiveDate, f64)> {
    let Some((first, last)) = month_range(&view.rows) else {
        return Vec::new();
    };

    let mut sums: HashMap<NaiveDate, f64> = HashMap::new();
    for row in &view.rows {
        *sums.entry(row.month).or_insert(0.0) += row.revenue.unwrap_or(0.0);
    }

    month_grid(first, last)
        .into_iter()
        .map(|m| (m, sums.get(&m).copied().unwrap_or(0.0)))
        .collect()
}

#[derive(Default)]
struct GroupAcc {
    revenue: f64,
    units: f64,
    margins: Vec<f64>,
    online: f64,
    offline: f64,
}

/// Aggregate per label of `dimension`, sorted by revenue descending.
///
/// Ties keep label order so the ranking is stable across runs.
pub fn rank_by(view: &FilteredView, dimension: Dimension, top_n: Option<usize>) -> Vec<RankRow> {
    let mut groups: BTreeMap<&str, GroupAcc> = BTreeMap::new();
    for row in &view.rows {
        let acc = groups.entry(row.label(dimension)).or_default();
        acc.revenue += row.revenue.unwrap_or(0.0);
        acc.units += row.units.unwrap_or(0.0);
        acc.online += row.online_revenue.unwrap_or(0.0);
        acc.offline += row.offline_revenue.unwrap_or(0.0);
        if let Some(m) = row.margin_pct {
            acc.margins.push(m);
        }
    }

    let mut ranked: Vec<RankRow> = groups
        .into_iter()
        .map(|(label, acc)| RankRow {
            label: label.to_string(),
            revenue: acc.revenue,
            units: acc.units,
            margin_avg: mean(&acc.margins),
            online_revenue: acc.online,
            offline_revenue: acc.offline,
            online_share: ratio(acc.online, acc.online + acc.offline).map(|s| s * 100.0),
        })
        .collect();

    ranked.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    if let Some(n) = top_n {
        ranked.truncate(n);
    }
    ranked
}

/// Per-label revenue growth between `year - 1` and `year`.
///
/// Labels present in either year are listed; sorted by YoY descending with
/// undefined growth last. The view must still hold `year - 1`; see
/// `app::pipeline::group_yoy` for the period-independent scope.
pub fn yoy_by_group(view: &FilteredView, dimension: Dimension, year: i32) -> Vec<GroupYoy> {
    let mut groups: BTreeMap<&str, (Option<f64>, f64)> = BTreeMap::new();
    for row in view.rows.iter().filter(|r| r.year == year || r.year == year - 1) {
        let entry = groups.entry(row.label(dimension)).or_insert((None, 0.0));
        let revenue = row.revenue.unwrap_or(0.0);
        if row.year == year {
            entry.1 += revenue;
        } else {
            entry.0 = Some(entry.0.unwrap_or(0.0) + revenue);
        }
    }

    let mut out: Vec<GroupYoy> = groups
        .into_iter()
        .map(|(label, (prior, current))| GroupYoy {
            label: label.to_string(),
            revenue_prior: prior,
            revenue_current: current,
            yoy: prior.and_then(|p| yoy_from_sums(current, p)),
        })
        .collect();

    out.sort_by(|a, b| match (a.yoy, b.yoy) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    out
}

/// Online and offline revenue per period, in chronological order.
pub fn channel_breakdown(view: &FilteredView, granularity: Granularity) -> Vec<ChannelPeriod> {
    let mut periods: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for row in &view.rows {
        let key = match granularity {
            Granularity::Year => row.year.to_string(),
            Granularity::Month => row.month_label.clone(),
        };
        let entry = periods.entry(key).or_insert((0.0, 0.0));
        entry.0 += row.online_revenue.unwrap_or(0.0);
        entry.1 += row.offline_revenue.unwrap_or(0.0);
    }

    periods
        .into_iter()
        .map(|(period, (online_revenue, offline_revenue))| ChannelPeriod {
            period,
            online_revenue,
            offline_revenue,
        })
        .collect()
}

/// Narrative growth figures for the KPI summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub first_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub historical_cagr: Option<f64>,
    pub latest_yoy: Option<f64>,
    pub forecast_cagr: Option<f64>,
}

pub fn insights(view: &FilteredView, forecast: Option<&ForecastSeries>) -> Insights {
    let annual = annual_revenue(view);
    let first_year = annual.keys().next().copied();
    let latest_year = annual.keys().next_back().copied();

    Insights {
        first_year,
        latest_year,
        historical_cagr: historical_cagr(view),
        latest_yoy: latest_year.and_then(|y| year_over_year(view, MetricColumn::Revenue, y)),
        forecast_cagr: forecast.and_then(forecast_cagr),
    }
}

fn sum_present(rows: &[PreparedRow], pick: impl Fn(&PreparedRow) -> Option<f64>) -> f64 {
    rows.iter().filter_map(pick).sum()
}

fn sum_where(rows: &[PreparedRow], metric: MetricColumn, keep: impl Fn(&PreparedRow) -> bool) -> f64 {
    rows.iter().filter(|r| keep(r)).filter_map(|r| metric.value(r)).sum()
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    Some(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FactRow, ForecastMethod, ForecastPoint, add_months};

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(month: NaiveDate, brand: &str, country: &str, revenue: f64) -> PreparedRow {
        let fact = FactRow {
            month,
            brand_key: brand.into(),
            country_key: country.into(),
            revenue: Some(revenue),
            units: Some(revenue / 100.0),
            aov: Some(100.0),
            margin_pct: Some(60.0),
            online_revenue: Some(revenue * 0.25),
            offline_revenue: Some(revenue * 0.75),
        };
        PreparedRow::from_fact(fact, brand.into(), country.into())
    }

    fn flat_24() -> FilteredView {
        FilteredView::new((0..24).map(|i| row(add_months(ym(2023, 1), i), "Dior", "France", 1000.0)).collect())
    }

    #[test]
    fn flat_series_scenario() {
        let view = flat_24();
        let t = totals(&view);
        assert_eq!(t.revenue_total, 24_000.0);
        assert_eq!(t.average_order_value, Some(100.0));
        assert!(!t.aov_from_column);
        assert!((t.online_share.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(year_over_year(&view, MetricColumn::Revenue, 2024), Some(0.0));
    }

    #[test]
    fn yoy_undefined_only_on_zero_prior() {
        assert_eq!(yoy_from_sums(500.0, 500.0), Some(0.0));
        assert_eq!(yoy_from_sums(500.0, 0.0), None);
        assert_eq!(yoy_from_sums(500.0, f64::NAN), None);
        assert_eq!(yoy_from_sums(150.0, 100.0), Some(50.0));

        // No prior-year rows at all behaves like a zero prior.
        assert_eq!(year_over_year(&flat_24(), MetricColumn::Revenue, 2023), None);
    }

    #[test]
    fn aov_falls_back_to_column_mean() {
        let mut r = row(ym(2024, 1), "Dior", "France", 1000.0);
        r.units = None;
        r.aov = Some(250.0);
        let t = totals(&FilteredView::new(vec![r.clone()]));
        assert_eq!(t.average_order_value, Some(250.0));
        assert!(t.aov_from_column);

        r.aov = None;
        let t = totals(&FilteredView::new(vec![r]));
        assert_eq!(t.average_order_value, None);
    }

    #[test]
    fn empty_view_totals_are_not_available() {
        let t = totals(&FilteredView::default());
        assert_eq!(t.revenue_total, 0.0);
        assert_eq!(t.average_order_value, None);
        assert_eq!(t.online_share, None);
        assert_eq!(t.average_margin, None);
        assert_eq!(year_to_date(&FilteredView::default(), MetricColumn::Revenue), None);
    }

    #[test]
    fn ytd_compares_like_for_like_months() {
        let mut rows: Vec<PreparedRow> = (1..=12).map(|m| row(ym(2023, m), "Dior", "France", 100.0)).collect();
        rows.extend((1..=3).map(|m| row(ym(2024, m), "Dior", "France", 120.0)));
        let ytd = year_to_date(&FilteredView::new(rows), MetricColumn::Revenue).unwrap();
        assert_eq!(ytd.year, 2024);
        assert_eq!(ytd.through_month, 3);
        assert_eq!(ytd.ytd_current, 360.0);
        assert_eq!(ytd.ytd_prior, 300.0);
        assert!((ytd.ytd_yoy.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn compound_growth_cases() {
        assert_eq!(compound_growth(250.0, 250.0, 3.0), Some(0.0));
        assert!((compound_growth(100.0, 121.0, 2.0).unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(compound_growth(0.0, 100.0, 2.0), None);
        assert_eq!(compound_growth(-5.0, 100.0, 2.0), None);
        assert_eq!(compound_growth(100.0, 120.0, 0.0), None);
    }

    #[test]
    fn monthly_revenue_fills_gaps_with_zero() {
        let view = FilteredView::new(vec![
            row(ym(2024, 1), "Dior", "France", 10.0),
            row(ym(2024, 1), "Gucci", "France", 5.0),
            row(ym(2024, 4), "Dior", "France", 7.0),
        ]);
        let series = monthly_revenue(&view);
        assert_eq!(
            series,
            vec![(ym(2024, 1), 15.0), (ym(2024, 2), 0.0), (ym(2024, 3), 0.0), (ym(2024, 4), 7.0)]
        );
    }

    #[test]
    fn ranking_orders_by_revenue_and_truncates() {
        let view = FilteredView::new(vec![
            row(ym(2024, 1), "Dior", "France", 10.0),
            row(ym(2024, 2), "Gucci", "Japan", 50.0),
            row(ym(2024, 3), "Hermès", "France", 30.0),
            row(ym(2024, 4), "Dior", "Japan", 15.0),
        ]);
        let ranked = rank_by(&view, Dimension::Brand, Some(2));
        let labels: Vec<&str> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Gucci", "Hermès"]);

        let by_country = rank_by(&view, Dimension::Country, None);
        assert_eq!(by_country[0].label, "Japan");
        assert_eq!(by_country[0].revenue, 65.0);
        assert_eq!(by_country[0].margin_avg, Some(60.0));
    }

    #[test]
    fn group_yoy_puts_undefined_last() {
        let view = FilteredView::new(vec![
            row(ym(2023, 5), "Dior", "France", 100.0),
            row(ym(2024, 5), "Dior", "France", 110.0),
            row(ym(2023, 5), "Gucci", "France", 100.0),
            row(ym(2024, 5), "Gucci", "France", 150.0),
            row(ym(2024, 5), "Celine", "France", 80.0),
        ]);
        let out = yoy_by_group(&view, Dimension::Brand, 2024);
        let labels: Vec<&str> = out.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Gucci", "Dior", "Celine"]);
        assert_eq!(out[2].yoy, None);
        assert_eq!(out[2].revenue_prior, None);
    }

    #[test]
    fn channel_breakdown_by_year() {
        let out = channel_breakdown(&flat_24(), Granularity::Year);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].period, "2023");
        assert_eq!(out[0].online_revenue, 3000.0);
        assert_eq!(out[0].offline_revenue, 9000.0);
        assert_eq!(channel_breakdown(&flat_24(), Granularity::Month).len(), 24);
    }

    #[test]
    fn insights_on_growing_series() {
        let mut rows: Vec<PreparedRow> = (1..=12).map(|m| row(ym(2022, m), "Dior", "France", 100.0)).collect();
        rows.extend((1..=12).map(|m| row(ym(2024, m), "Dior", "France", 121.0)));
        let view = FilteredView::new(rows);
        let ins = insights(&view, None);
        assert_eq!(ins.first_year, Some(2022));
        assert_eq!(ins.latest_year, Some(2024));
        assert!((ins.historical_cagr.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(ins.latest_yoy, None);
    }

    #[test]
    fn forecast_cagr_spans_projection() {
        let last = ym(2024, 12);
        let point = |month, point| ForecastPoint {
            month,
            actual: None,
            point,
            lower: point,
            upper: point,
        };
        let series = ForecastSeries {
            method: ForecastMethod::AdditiveSeasonal,
            points: vec![point(last, 100.0), point(ym(2025, 6), 105.0), point(ym(2026, 12), 121.0)],
            last_actual: last,
            horizon_months: 24,
            fallback_reason: None,
            seasonality_order: Some(3),
        };
        assert!((forecast_cagr(&series).unwrap() - 10.0).abs() < 1e-9);

        let fallback = ForecastSeries {
            method: ForecastMethod::MovingAverage,
            points: vec![point(last, 100.0)],
            ..series
        };
        assert_eq!(forecast_cagr(&fallback), None);
    }
}
