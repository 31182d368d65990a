//! Shared request pipeline used by every analytics command.
//!
//! source resolution -> enrichment -> cache -> filter
//!
//! The commands then hand the filtered view to the metric, forecast or
//! correlation engines and focus on presentation.

use std::sync::Arc;

use serde::Serialize;

use crate::correlate::correlate;
use crate::data::config::first_existing;
use crate::data::{DatasetCache, SourceConfig, SourceResolver};
use crate::domain::{
    ChannelPeriod, CorrelationResult, Dimension, EffectiveSelection, FilterSelection, FilteredView,
    ForecastSeries, GroupYoy, MetricColumn, PreparedDataset, SignalTable, Totals, YearToDate,
};
use crate::error::{AppError, AppResult};
use crate::filter::labels_only;
use crate::forecast::{ForecastOptions, forecast};
use crate::io::ingest::read_signal_table;
use crate::metrics::{Insights, insights, monthly_revenue, totals, year_to_date, yoy_by_group};

/// One configured session: a source configuration plus its dataset cache.
#[derive(Debug)]
pub struct Pipeline {
    config: SourceConfig,
    cache: DatasetCache,
}

/// A filtered request against the cached dataset.
#[derive(Debug, Clone)]
pub struct Selected {
    pub dataset: Arc<PreparedDataset>,
    pub view: FilteredView,
    pub effective: EffectiveSelection,
}

/// Everything the KPI page shows, ready for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct KpiReport {
    pub selection: EffectiveSelection,
    pub totals: Totals,
    pub year_to_date: Option<YearToDate>,
    pub insights: Insights,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelPeriod>,
}

impl Pipeline {
    pub fn new(config: SourceConfig) -> Self {
        let cache = DatasetCache::new(config.cache_ttl);
        Self { config, cache }
    }

    /// The prepared dataset, rebuilt only when the cache window has passed.
    pub fn dataset(&self) -> AppResult<Arc<PreparedDataset>> {
        let key = self.config.cache_key();
        self.cache
            .get_or_build(&key, || SourceResolver::from_config(&self.config).resolve())
    }

    pub fn select(&self, selection: &FilterSelection) -> AppResult<Selected> {
        let dataset = self.dataset()?;
        let (view, effective) = crate::filter::apply(&dataset, selection);
        Ok(Selected {
            dataset,
            view,
            effective,
        })
    }

    /// Load the external signal table from the configured or default location.
    pub fn signals(&self) -> AppResult<SignalTable> {
        let candidates = self.config.signal_candidates();
        let path = first_existing(&candidates).ok_or_else(|| {
            let list: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            AppError::DataUnavailable(format!("No signal file found among [{}]", list.join(", ")))
        })?;
        log::debug!("signals: reading {}", path.display());
        read_signal_table(path)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}

/// KPI set over a filtered view.
pub fn kpi_report(selected: &Selected) -> KpiReport {
    KpiReport {
        selection: selected.effective.clone(),
        totals: totals(&selected.view),
        year_to_date: year_to_date(&selected.view, MetricColumn::Revenue),
        insights: insights(&selected.view, None),
        channels: Vec::new(),
    }
}

/// Per-label YoY for `year` against `year - 1`.
///
/// Only the brand/country part of `selection` applies: a period selection
/// of `year` alone must not hide the prior year.
pub fn group_yoy(dataset: &PreparedDataset, selection: &FilterSelection, dimension: Dimension, year: i32) -> Vec<GroupYoy> {
    let (scope, _) = crate::filter::apply(dataset, &labels_only(selection));
    yoy_by_group(&scope, dimension, year)
}

/// Forecast the monthly revenue of a filtered view.
pub fn forecast_view(view: &FilteredView, options: &ForecastOptions) -> AppResult<ForecastSeries> {
    forecast(&monthly_revenue(view), options)
}

/// Correlate the filtered view's monthly revenue with a signal table.
pub fn correlate_view(view: &FilteredView, signals: &SignalTable, normalize: bool) -> AppResult<Vec<CorrelationResult>> {
    correlate(&monthly_revenue(view), signals, normalize)
}
