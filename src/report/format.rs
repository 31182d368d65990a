//! Formatted terminal output.
//!
//! We keep formatting code in one place so the engines stay free of
//! presentation concerns and output changes are localized.

use chrono::NaiveDate;

use crate::data::quality::QualityReport;
use crate::domain::{
    ChannelPeriod, CorrelationResult, Dimension, EffectiveSelection, ForecastMethod, ForecastSeries, GroupYoy,
    PreparedDataset, RankRow, SourceKind, Totals, YearToDate,
};
use crate::metrics::Insights;

/// Source line plus the selection that was applied.
pub fn format_selection(dataset: &PreparedDataset, effective: &EffectiveSelection) -> String {
    let mut out = String::new();
    out.push_str("=== lbi - Luxury retail BI ===\n");
    out.push_str(&format!("Source: {}\n", describe_source(&dataset.source)));
    out.push_str(&format!(
        "Rows: {} loaded, {} skipped at ingest, {} selected\n",
        dataset.rows.len(),
        dataset.row_errors.len(),
        effective.rows_matched
    ));
    out.push_str(&format!(
        "Period: {} .. {}\n",
        fmt_month(effective.from),
        fmt_month(effective.to)
    ));
    out.push_str(&format!("Years: {}\n", join_or_none(effective.years.iter().map(|y| y.to_string()))));
    out.push_str(&format!("Brands: {}\n", join_or_none(effective.brands.iter().cloned())));
    out.push_str(&format!("Countries: {}\n", join_or_none(effective.countries.iter().cloned())));
    out
}

/// Headline KPIs, YTD and growth figures.
pub fn format_kpis(totals: &Totals, ytd: Option<&YearToDate>, insights: &Insights) -> String {
    let mut out = String::new();
    out.push_str("\nKPIs:\n");
    out.push_str(&format!("  Revenue        {:>18}\n", fmt_money(totals.revenue_total)));
    out.push_str(&format!("  Units          {:>18}\n", fmt_money(totals.units_total)));

    let aov = fmt_opt_money(totals.average_order_value);
    let aov_note = if totals.aov_from_column { " (mean of aov column)" } else { "" };
    out.push_str(&format!("  Avg order      {aov:>18}{aov_note}\n"));
    out.push_str(&format!("  Avg margin     {:>18}\n", fmt_pct_plain(totals.average_margin)));
    out.push_str(&format!("  Online share   {:>18}\n", fmt_pct_plain(totals.online_share)));

    if let Some(ytd) = ytd {
        out.push_str(&format!(
            "\nYTD {} (Jan-{}): {} vs {} -> {}\n",
            ytd.year,
            month_abbrev(ytd.through_month),
            fmt_money(ytd.ytd_current),
            fmt_money(ytd.ytd_prior),
            fmt_pct(ytd.ytd_yoy)
        ));
    }

    out.push_str("\nGrowth:\n");
    match (insights.first_year, insights.latest_year) {
        (Some(first), Some(last)) if last > first => {
            out.push_str(&format!("  CAGR {first}-{last}: {}\n", fmt_pct(insights.historical_cagr)));
        }
        _ => out.push_str("  CAGR: n/a (single year)\n"),
    }
    if let Some(year) = insights.latest_year {
        out.push_str(&format!("  YoY {year}: {}\n", fmt_pct(insights.latest_yoy)));
    }
    if let Some(cagr) = insights.forecast_cagr {
        out.push_str(&format!("  Forecast CAGR: {}\n", fmt_pct(Some(cagr))));
    }
    out
}

/// Ranking table for one dimension.
pub fn format_rankings(rows: &[RankRow], dimension: Dimension) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nTop {} by revenue:\n", dimension.display_name().to_lowercase()));
    push_line(
        &mut out,
        format!(
            "{:<24} {:>16} {:>10} {:>9} {:>9}",
            dimension.display_name(),
            "revenue",
            "units",
            "margin",
            "online"
        ),
    );
    push_line(&mut out, format!("{:-<24} {:-<16} {:-<10} {:-<9} {:-<9}", "", "", "", "", ""));
    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>16} {:>10} {:>9} {:>9}",
                truncate(&r.label, 24),
                fmt_money(r.revenue),
                fmt_money(r.units),
                fmt_pct_plain(r.margin_avg),
                fmt_pct_plain(r.online_share)
            ),
        );
    }
    out
}

/// Per-label growth table.
pub fn format_group_yoy(rows: &[GroupYoy], dimension: Dimension, year: i32) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nYoY {year} by {}:\n", dimension.display_name().to_lowercase()));
    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>16} {:>16} {:>9}",
                truncate(&r.label, 24),
                fmt_opt_money(r.revenue_prior),
                fmt_money(r.revenue_current),
                fmt_pct(r.yoy)
            ),
        );
    }
    out
}

pub fn format_channels(periods: &[ChannelPeriod]) -> String {
    let mut out = String::new();
    out.push_str("\nChannels:\n");
    push_line(&mut out, format!("{:<10} {:>16} {:>16}", "period", "online", "offline"));
    for p in periods {
        push_line(
            &mut out,
            format!(
                "{:<10} {:>16} {:>16}",
                p.period,
                fmt_money(p.online_revenue),
                fmt_money(p.offline_revenue)
            ),
        );
    }
    out
}

/// Forecast summary: method, then the projected months (or the smoothed tail).
pub fn format_forecast(series: &ForecastSeries, tail: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nForecast: {}\n", series.method.display_name()));
    if let Some(reason) = &series.fallback_reason {
        out.push_str(&format!("  (primary model not used: {reason})\n"));
    }
    if let Some(order) = series.seasonality_order {
        out.push_str(&format!("  yearly Fourier order: {order}\n"));
    }

    let rows: Vec<_> = match series.method {
        ForecastMethod::AdditiveSeasonal => series.future().collect(),
        ForecastMethod::MovingAverage => {
            out.push_str("  no projection available; showing the smoothed history\n");
            let skip = series.points.len().saturating_sub(tail);
            series.points.iter().skip(skip).collect()
        }
    };

    push_line(
        &mut out,
        format!("{:<8} {:>16} {:>16} {:>16} {:>16}", "month", "actual", "point", "lower", "upper"),
    );
    for p in rows {
        push_line(
            &mut out,
            format!(
                "{:<8} {:>16} {:>16} {:>16} {:>16}",
                p.month.format("%Y-%m"),
                fmt_opt_money(p.actual),
                fmt_money(p.point),
                fmt_money(p.lower),
                fmt_money(p.upper)
            ),
        );
    }
    out
}

pub fn format_correlations(results: &[CorrelationResult]) -> String {
    let mut out = String::new();
    out.push_str("\nSignal correlation with revenue:\n");
    if results.is_empty() {
        out.push_str("  no overlapping months between signals and revenue\n");
        return out;
    }
    push_line(&mut out, format!("{:<24} {:>8} {:>6}", "topic", "r", "n"));
    for r in results {
        let coef = r.coefficient.map(|c| format!("{c:.3}")).unwrap_or_else(|| "n/a".into());
        push_line(
            &mut out,
            format!("{:<24} {:>8} {:>6}", truncate(&r.topic, 24), coef, r.observations),
        );
    }
    out
}

/// Quality findings, capped at `limit` detail lines.
pub fn format_quality(report: &QualityReport, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nData quality: {} rows checked, {} skipped at ingest, {} finding(s)\n",
        report.rows_checked,
        report.rows_skipped_at_ingest,
        report.issues.len()
    ));
    for issue in report.issues.iter().take(limit) {
        out.push_str(&format!("  [{}] {}\n", issue.rule.display_name(), issue.detail));
    }
    if report.issues.len() > limit {
        out.push_str(&format!("  ... {} more\n", report.issues.len() - limit));
    }
    out
}

fn describe_source(source: &SourceKind) -> String {
    match source {
        SourceKind::Database(url) => format!("database {url}"),
        SourceKind::File(path) => format!("file {}", path.display()),
        SourceKind::Memory => "in-memory".to_string(),
    }
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Thousands-separated, no decimals.
pub fn fmt_money(v: f64) -> String {
    if !v.is_finite() {
        return "n/a".to_string();
    }
    let rounded = v.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn fmt_opt_money(v: Option<f64>) -> String {
    v.map(fmt_money).unwrap_or_else(|| "n/a".to_string())
}

/// Signed percentage change.
pub fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(p) if p.is_finite() => format!("{p:+.1}%"),
        _ => "n/a".to_string(),
    }
}

fn fmt_pct_plain(v: Option<f64>) -> String {
    match v {
        Some(p) if p.is_finite() => format!("{p:.1}%"),
        _ => "n/a".to_string(),
    }
}

fn fmt_month(m: Option<NaiveDate>) -> String {
    m.map(|d| d.format("%Y-%m").to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn month_abbrev(month: u32) -> &'static str {
    const NAMES: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    NAMES.get(month.saturating_sub(1) as usize).copied().unwrap_or("?")
}

fn join_or_none(items: impl Iterator<Item = String>) -> String {
    let v: Vec<String> = items.collect();
    if v.is_empty() { "(none)".to_string() } else { v.join(", ") }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
