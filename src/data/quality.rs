//! Advisory data-quality checks over the prepared dataset.
//!
//! Nothing here rejects data: findings are reported alongside the dashboard
//! so that odd numbers can be traced back to their rows.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{PreparedDataset, PreparedRow};

/// Default relative tolerance for `online + offline == revenue`.
pub const DEFAULT_CHANNEL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRule {
    ChannelMismatch,
    NegativeRevenue,
    MissingRevenue,
    DuplicateKey,
    UnlabeledKey,
}

impl QualityRule {
    pub fn display_name(self) -> &'static str {
        match self {
            QualityRule::ChannelMismatch => "online + offline != revenue",
            QualityRule::NegativeRevenue => "negative revenue",
            QualityRule::MissingRevenue => "missing revenue",
            QualityRule::DuplicateKey => "duplicate (month, brand, country)",
            QualityRule::UnlabeledKey => "key without dimension label",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub rule: QualityRule,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub rows_checked: usize,
    pub rows_skipped_at_ingest: usize,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn count(&self, rule: QualityRule) -> usize {
        self.issues.iter().filter(|i| i.rule == rule).count()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.rows_skipped_at_ingest == 0
    }
}

/// Run every check and collect findings.
pub fn check_dataset(dataset: &PreparedDataset, channel_tolerance: f64) -> QualityReport {
    let mut issues = Vec::new();
    let mut seen: HashMap<(String, &str, &str), usize> = HashMap::new();

    for row in &dataset.rows {
        match row.revenue {
            None => issues.push(issue(QualityRule::MissingRevenue, row, String::new())),
            Some(rev) if rev < 0.0 => issues.push(issue(QualityRule::NegativeRevenue, row, format!("revenue={rev}"))),
            Some(rev) => {
                if let (Some(on), Some(off)) = (row.online_revenue, row.offline_revenue) {
                    let gap = on + off - rev;
                    if gap.abs() > channel_tolerance * rev.abs().max(1.0) {
                        issues.push(issue(
                            QualityRule::ChannelMismatch,
                            row,
                            format!("online={on} offline={off} revenue={rev} gap={gap:.2}"),
                        ));
                    }
                }
            }
        }

        let count = seen
            .entry((row.month_label.clone(), row.brand_key.as_str(), row.country_key.as_str()))
            .or_insert(0);
        *count += 1;
        if *count == 2 {
            issues.push(issue(QualityRule::DuplicateKey, row, String::new()));
        }
    }

    for (dimension, key) in &dataset.unlabeled_keys {
        issues.push(QualityIssue {
            rule: QualityRule::UnlabeledKey,
            detail: format!("{} key '{key}'", dimension.display_name().to_lowercase()),
        });
    }

    QualityReport {
        rows_checked: dataset.rows.len(),
        rows_skipped_at_ingest: dataset.row_errors.len(),
        issues,
    }
}

fn issue(rule: QualityRule, row: &PreparedRow, extra: String) -> QualityIssue {
    let mut detail = format!("{} brand={} country={}", row.month_label, row.brand_key, row.country_key);
    if !extra.is_empty() {
        detail.push(' ');
        detail.push_str(&extra);
    }
    QualityIssue { rule, detail }
}
