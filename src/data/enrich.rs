//! Dimension enrichment: replace opaque keys with display labels.

use std::collections::BTreeSet;

use crate::data::source::SourceTables;
use crate::domain::{Dimension, DimensionTable, FactRow, PreparedDataset, PreparedRow, SourceKind};

/// Left-join brand and country labels onto fact rows.
///
/// A key with no dimension entry keeps its raw string as the label, so the
/// output always has exactly one row per input row.
pub fn enrich(facts: Vec<FactRow>, brands: &DimensionTable, countries: &DimensionTable) -> PreparedDataset {
    let rows_read = facts.len();
    let mut unlabeled: BTreeSet<(Dimension, String)> = BTreeSet::new();

    let rows = facts
        .into_iter()
        .map(|fact| {
            let brand = label_or_key(brands, &fact.brand_key, Dimension::Brand, &mut unlabeled);
            let country = label_or_key(countries, &fact.country_key, Dimension::Country, &mut unlabeled);
            PreparedRow::from_fact(fact, brand, country)
        })
        .collect();

    PreparedDataset {
        rows,
        source: SourceKind::Memory,
        rows_read,
        row_errors: Vec::new(),
        unlabeled_keys: unlabeled.into_iter().collect(),
    }
}

/// Enrich everything a source returned, keeping its provenance and row errors.
pub fn prepare(tables: SourceTables) -> PreparedDataset {
    let SourceTables {
        facts,
        brands,
        countries,
        origin,
    } = tables;

    let mut dataset = enrich(facts.facts, &brands, &countries);
    dataset.source = origin;
    dataset.rows_read = facts.rows_read;
    dataset.row_errors = facts.row_errors;
    dataset
}

fn label_or_key(
    table: &DimensionTable,
    key: &str,
    dimension: Dimension,
    unlabeled: &mut BTreeSet<(Dimension, String)>,
) -> String {
    match table.get(key) {
        Some(label) => label.to_string(),
        None => {
            if !table.is_empty() {
                unlabeled.insert((dimension, key.to_string()));
            }
            key.to_string()
        }
    }
}
