//! Selection filters over the prepared dataset.
//!
//! Four independent predicates combined with AND:
//! date-in-range, year-in-set, brand-in-set, country-in-set.
//!
//! Set semantics differ on purpose:
//! - brands/countries: an empty set means "no restriction"
//! - years: `None` means "no restriction", but `Some(empty)` matches nothing

use std::collections::BTreeSet;

use crate::domain::{EffectiveSelection, FilterSelection, FilteredView, PreparedDataset, PreparedRow};

/// Apply `selection` to `dataset`, returning the matching rows and the
/// selection with defaults filled in.
///
/// Never fails: a selection that matches nothing yields an empty view.
pub fn apply(dataset: &PreparedDataset, selection: &FilterSelection) -> (FilteredView, EffectiveSelection) {
    let observed = dataset.month_range();
    let from = selection.from.or(observed.map(|(min, _)| min));
    let to = selection.to.or(observed.map(|(_, max)| max));

    let rows: Vec<PreparedRow> = dataset
        .rows
        .iter()
        .filter(|row| in_range(row, from, to))
        .filter(|row| selection.years.as_ref().is_none_or(|years| years.contains(&row.year)))
        .filter(|row| selection.brands.is_empty() || selection.brands.contains(&row.brand))
        .filter(|row| selection.countries.is_empty() || selection.countries.contains(&row.country))
        .cloned()
        .collect();

    let years = match &selection.years {
        Some(years) => years.clone(),
        None => dataset.rows.iter().map(|r| r.year).collect(),
    };
    let brands = resolve_labels(&selection.brands, dataset, |r| &r.brand);
    let countries = resolve_labels(&selection.countries, dataset, |r| &r.country);

    let effective = EffectiveSelection {
        from,
        to,
        years,
        brands,
        countries,
        rows_matched: rows.len(),
    };
    log::debug!("filter: {} of {} rows matched", rows.len(), dataset.rows.len());

    (FilteredView::new(rows), effective)
}

/// The brand/country part of `selection`, with no period restriction.
pub fn labels_only(selection: &FilterSelection) -> FilterSelection {
    FilterSelection {
        brands: selection.brands.clone(),
        countries: selection.countries.clone(),
        ..FilterSelection::default()
    }
}

/// Every distinct label observed for a dimension, sorted.
pub fn available_labels(dataset: &PreparedDataset, pick: impl Fn(&PreparedRow) -> &String) -> BTreeSet<String> {
    dataset.rows.iter().map(|r| pick(r).clone()).collect()
}

fn in_range(row: &PreparedRow, from: Option<chrono::NaiveDate>, to: Option<chrono::NaiveDate>) -> bool {
    from.is_none_or(|f| row.month >= f) && to.is_none_or(|t| row.month <= t)
}

fn resolve_labels(
    selected: &BTreeSet<String>,
    dataset: &PreparedDataset,
    pick: impl Fn(&PreparedRow) -> &String,
) -> BTreeSet<String> {
    if selected.is_empty() {
        available_labels(dataset, pick)
    } else {
        selected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::enrich::enrich;
    use crate::domain::{DimensionTable, FactRow};
    use chrono::NaiveDate;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn dataset() -> PreparedDataset {
        let brands: DimensionTable = [("1", "Dior"), ("2", "Gucci")].into_iter().collect();
        let countries: DimensionTable = [("FR", "France"), ("JP", "Japan")].into_iter().collect();
        let mut facts = Vec::new();
        for (y, m) in [(2023, 1), (2023, 6), (2024, 1), (2024, 6)] {
            for b in ["1", "2"] {
                for c in ["FR", "JP"] {
                    facts.push(FactRow {
                        month: ym(y, m),
                        brand_key: b.into(),
                        country_key: c.into(),
                        revenue: Some(100.0),
                        units: Some(1.0),
                        aov: None,
                        margin_pct: None,
                        online_revenue: None,
                        offline_revenue: None,
                    });
                }
            }
        }
        enrich(facts, &brands, &countries)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_brand_and_country_sets_mean_all() {
        let ds = dataset();
        let (implicit, eff) = apply(&ds, &FilterSelection::default());
        let explicit = FilterSelection {
            brands: set(&["Dior", "Gucci"]),
            countries: set(&["France", "Japan"]),
            ..FilterSelection::default()
        };
        let (explicit_view, _) = apply(&ds, &explicit);

        assert_eq!(implicit, explicit_view);
        assert_eq!(implicit.len(), ds.rows.len());
        assert_eq!(eff.brands, set(&["Dior", "Gucci"]));
        assert_eq!(eff.from, Some(ym(2023, 1)));
        assert_eq!(eff.to, Some(ym(2024, 6)));
        assert_eq!(eff.years, [2023, 2024].into_iter().collect());
    }

    #[test]
    fn explicit_empty_year_set_selects_nothing() {
        let ds = dataset();
        let sel = FilterSelection {
            years: Some(BTreeSet::new()),
            ..FilterSelection::default()
        };
        let (view, eff) = apply(&ds, &sel);
        assert!(view.is_empty());
        assert_eq!(eff.rows_matched, 0);
        assert!(eff.years.is_empty());
    }

    #[test]
    fn predicates_combine_with_and() {
        let ds = dataset();
        let sel = FilterSelection {
            from: Some(ym(2023, 6)),
            to: Some(ym(2024, 1)),
            years: Some([2024].into_iter().collect()),
            brands: set(&["Dior"]),
            countries: set(&["Japan"]),
        };
        let (view, _) = apply(&ds, &sel);
        assert_eq!(view.len(), 1);
        let row = &view.rows[0];
        assert_eq!((row.month, row.brand.as_str(), row.country.as_str()), (ym(2024, 1), "Dior", "Japan"));
    }

    #[test]
    fn unknown_label_yields_empty_view() {
        let ds = dataset();
        let sel = FilterSelection {
            brands: set(&["Chanel"]),
            ..FilterSelection::default()
        };
        let (view, eff) = apply(&ds, &sel);
        assert!(view.is_empty());
        assert_eq!(eff.brands, set(&["Chanel"]));
    }
}
