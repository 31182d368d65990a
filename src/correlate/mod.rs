//! Correlation of external interest signals with monthly revenue.
//!
//! Signal files come from different exporters, so the three columns are
//! located through small alias lists. A file where any of the three cannot be
//! found is rejected with `SchemaMismatch` rather than guessed at.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::{CorrelationResult, SignalTable, first_of_month};
use crate::error::{AppError, AppResult};
use crate::io::ingest::{build_header_map, find_column, parse_date, parse_opt_f64};
use crate::math::{pearson, zscore};

const DATE_ALIASES: &[&str] = &["date", "ds", "week", "month"];
const TOPIC_ALIASES: &[&str] = &["topic", "keyword", "brand", "marque", "term"];
const SCORE_ALIASES: &[&str] = &["score", "value", "index", "interest"];

/// Monthly mean score per topic.
pub type TopicSeries = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

/// Correlate every signal topic with `revenue` over their overlapping months.
///
/// With `normalize`, both sides are z-scored before the coefficient is taken.
/// Results are sorted by coefficient descending; undefined coefficients sort
/// last. Topics with no overlapping month are left out, so a signal file that
/// never overlaps the revenue series yields an empty list.
pub fn correlate(
    revenue: &[(NaiveDate, f64)],
    signals: &SignalTable,
    normalize: bool,
) -> AppResult<Vec<CorrelationResult>> {
    let topics = monthly_topic_means(signals)?;
    let revenue: HashMap<NaiveDate, f64> = revenue.iter().map(|(m, v)| (first_of_month(*m), *v)).collect();

    let mut results: Vec<CorrelationResult> = topics
        .par_iter()
        .filter_map(|(topic, series)| {
            let (x, y): (Vec<f64>, Vec<f64>) = series
                .iter()
                .filter_map(|(month, score)| revenue.get(month).map(|r| (*score, *r)))
                .unzip();
            if x.is_empty() {
                return None;
            }
            let coefficient = if normalize {
                pearson(&zscore(&x), &zscore(&y))
            } else {
                pearson(&x, &y)
            };
            Some(CorrelationResult {
                topic: topic.clone(),
                coefficient,
                observations: x.len(),
            })
        })
        .collect();

    results.sort_by(|a, b| match (a.coefficient, b.coefficient) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.topic.cmp(&b.topic)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.topic.cmp(&b.topic),
    });

    log::debug!("correlate: {} topic(s) overlap the revenue series", results.len());
    Ok(results)
}

/// Truncate signal dates to the month and average same-month scores per topic.
///
/// Rows with an unparseable date or score are skipped.
pub fn monthly_topic_means(signals: &SignalTable) -> AppResult<TopicSeries> {
    let header_map = build_header_map(&signals.columns);
    let (date_idx, topic_idx, score_idx) = match (
        find_column(&header_map, DATE_ALIASES),
        find_column(&header_map, TOPIC_ALIASES),
        find_column(&header_map, SCORE_ALIASES),
    ) {
        (Some(d), Some(t), Some(s)) => (d, t, s),
        _ => {
            return Err(AppError::SchemaMismatch(format!(
                "Signal columns [{}] do not include a date ({}), topic ({}) and score ({}) column",
                signals.columns.join(", "),
                DATE_ALIASES.join("/"),
                TOPIC_ALIASES.join("/"),
                SCORE_ALIASES.join("/"),
            )));
        }
    };

    let mut sums: BTreeMap<String, BTreeMap<NaiveDate, (f64, usize)>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &signals.rows {
        let date = row.get(date_idx).and_then(|s| parse_date(s));
        let topic = row.get(topic_idx).map(|s| s.trim()).filter(|s| !s.is_empty());
        let score = parse_opt_f64(row.get(score_idx).map(String::as_str));

        let (Some(date), Some(topic), Some(score)) = (date, topic, score) else {
            skipped += 1;
            continue;
        };
        let slot = sums
            .entry(topic.to_string())
            .or_default()
            .entry(first_of_month(date))
            .or_insert((0.0, 0));
        slot.0 += score;
        slot.1 += 1;
    }
    if skipped > 0 {
        log::debug!("correlate: skipped {skipped} signal row(s) with missing date, topic or score");
    }

    Ok(sums
        .into_iter()
        .map(|(topic, months)| {
            let means = months.into_iter().map(|(m, (s, c))| (m, s / c as f64)).collect();
            (topic, means)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::add_months;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn table(columns: &[&str], rows: Vec<Vec<String>>) -> SignalTable {
        SignalTable {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn revenue(n: i32) -> Vec<(NaiveDate, f64)> {
        (0..n).map(|i| (add_months(ym(2024, 1), i), 100.0 + 10.0 * i as f64)).collect()
    }

    #[test]
    fn unrecognised_columns_are_a_schema_mismatch() {
        let signals = table(
            &["fecha", "tema", "puntaje"],
            vec![vec!["2024-01-07".into(), "Dior".into(), "50".into()]],
        );
        let err = correlate(&revenue(6), &signals, true).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn no_overlap_is_an_empty_result() {
        let signals = table(
            &["ds", "keyword", "value"],
            vec![vec!["2019-03-03".into(), "Dior".into(), "40".into()]],
        );
        assert!(correlate(&revenue(6), &signals, false).unwrap().is_empty());
    }

    #[test]
    fn weekly_scores_are_averaged_per_month() {
        let signals = table(
            &["Date", "Topic", "Score"],
            vec![
                vec!["2024-01-07".into(), "Dior".into(), "40".into()],
                vec!["2024-01-21".into(), "Dior".into(), "60".into()],
                vec!["2024-02-04".into(), "Dior".into(), "n/a".into()],
            ],
        );
        let means = monthly_topic_means(&signals).unwrap();
        assert_eq!(means["Dior"].len(), 1);
        assert_eq!(means["Dior"][&ym(2024, 1)], 50.0);
    }

    #[test]
    fn results_sorted_by_coefficient() {
        let mut rows = Vec::new();
        for i in 0..6 {
            let month = add_months(ym(2024, 1), i).format("%Y-%m-15").to_string();
            rows.push(vec![month.clone(), "Rising".into(), format!("{}", 10 + i)]);
            rows.push(vec![month.clone(), "Falling".into(), format!("{}", 90 - i)]);
            rows.push(vec![month, "Flat".into(), "5".into()]);
        }
        let signals = table(&["date", "brand", "index"], rows);

        let out = correlate(&revenue(6), &signals, true).unwrap();
        let topics: Vec<&str> = out.iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(topics, vec!["Rising", "Falling", "Flat"]);
        assert!((out[0].coefficient.unwrap() - 1.0).abs() < 1e-9);
        assert!((out[1].coefficient.unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(out[2].coefficient, None);
        assert!(out.iter().all(|r| r.observations == 6));
    }

    #[test]
    fn only_overlapping_months_are_used() {
        let signals = table(
            &["date", "topic", "score"],
            vec![
                vec!["2023-12-01".into(), "Dior".into(), "1".into()],
                vec!["2024-01-01".into(), "Dior".into(), "2".into()],
                vec!["2024-02-01".into(), "Dior".into(), "3".into()],
            ],
        );
        let out = correlate(&revenue(3), &signals, false).unwrap();
        assert_eq!(out[0].observations, 2);
    }
}
