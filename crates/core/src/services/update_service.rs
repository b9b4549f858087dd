use std::collections::HashMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use crate::errors::EngineError;
use crate::models::chart_type::ChartType;
use crate::models::period::{sort_periods, PeriodInfo};
use crate::models::record::PriceRecord;
use crate::providers::traits::MarketDataProvider;
use crate::services::chart_service::ChartService;
use crate::storage::period_store::PeriodStore;

/// Chunk size used for provider fetches and store writes unless the
/// caller overrides it.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// What a finished update run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Assets the caller asked to refresh
    pub requested: usize,
    /// Assets the provider returned any payload for
    pub fetched: usize,
    /// Assets whose period collection was written back
    pub updated: usize,
    /// Assets skipped because they had no stored period info yet
    pub skipped_unseeded: usize,
}

/// Orchestrates one incremental chart refresh: fetch fresh provider data
/// in bounded chunks, merge it into the previously stored period
/// collections, and write the result back per asset.
///
/// Runs are sequential by design (upstream rate limits); concurrent runs
/// against the same assets must be serialized by the caller.
pub struct UpdateService {
    chart_service: ChartService,
    provider_chunk_size: usize,
    store_chunk_size: usize,
}

impl UpdateService {
    pub fn new() -> Self {
        Self::with_chunk_sizes(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZE)
    }

    /// Independent chunk sizes for provider requests and store writes.
    /// Sizes are clamped to at least 1.
    pub fn with_chunk_sizes(provider_chunk_size: usize, store_chunk_size: usize) -> Self {
        Self {
            chart_service: ChartService::new(),
            provider_chunk_size: provider_chunk_size.max(1),
            store_chunk_size: store_chunk_size.max(1),
        }
    }

    /// Merge freshly fetched provider data into previously stored period
    /// collections.
    ///
    /// Per asset present in `provider_data`:
    /// - assets with no stored periods are skipped (they must be seeded
    ///   through another process before incremental updates apply);
    /// - the entry for `chart_type` is rebuilt, seeding the carry-forward
    ///   baseline from the oldest stored point; an empty rebuild leaves
    ///   the stored entry untouched (no-clobber);
    /// - a missing `chart_type` entry is appended and the collection
    ///   re-sorted into canonical order;
    /// - every other period passes through unchanged.
    pub fn merge_asset_periods(
        &self,
        provider_data: &HashMap<String, Vec<PriceRecord>>,
        previous_periods: &HashMap<String, Vec<PeriodInfo>>,
        chart_type: ChartType,
        tz: Tz,
        today: NaiveDate,
    ) -> HashMap<String, Vec<PeriodInfo>> {
        let mut result = HashMap::new();

        for (asset_id, records) in provider_data {
            let Some(previous) = previous_periods.get(asset_id).filter(|p| !p.is_empty())
            else {
                info!(asset_id = %asset_id, "no stored period info; skipping");
                continue;
            };

            let mut merged = Vec::with_capacity(previous.len() + 1);
            let mut refreshed = false;

            for period in previous {
                if period.period != chart_type {
                    merged.push(period.clone());
                    continue;
                }

                refreshed = true;
                let rebuilt = self.chart_service.build_graph(
                    chart_type,
                    records,
                    period.baseline_price(),
                    tz,
                    today,
                );
                if rebuilt.is_empty() {
                    // An empty fetch never overwrites stored data.
                    merged.push(period.clone());
                } else {
                    merged.push(PeriodInfo::from_graph(chart_type, rebuilt));
                }
            }

            if !refreshed {
                let rebuilt = self
                    .chart_service
                    .build_graph(chart_type, records, None, tz, today);
                merged.push(PeriodInfo::from_graph(chart_type, rebuilt));
            }

            sort_periods(&mut merged);
            result.insert(asset_id.clone(), merged);
        }

        result
    }

    /// One full update run for a chart type over a list of asset ids.
    ///
    /// Provider fetches and store writes are issued per chunk,
    /// sequentially; a failing chunk aborts the whole run. Per-asset
    /// robustness (timeouts, unseeded assets, empty payloads) is handled
    /// below this level, so an aborted run means the provider or the
    /// store itself is broken.
    pub async fn run(
        &self,
        provider: &dyn MarketDataProvider,
        store: &dyn PeriodStore,
        chart_type: ChartType,
        asset_ids: &[String],
        today: NaiveDate,
    ) -> Result<UpdateSummary, EngineError> {
        info!(
            origin = provider.name(),
            chart_type = %chart_type,
            assets = asset_ids.len(),
            "starting chart update run"
        );

        let previous_periods = store.get_periods_batch(asset_ids).await?;

        let mut provider_data: HashMap<String, Vec<PriceRecord>> = HashMap::new();
        for chunk in asset_ids.chunks(self.provider_chunk_size) {
            let fetched = provider.fetch_series_batch(chunk, chart_type).await?;
            provider_data.extend(fetched);
        }
        info!(
            origin = provider.name(),
            fetched = provider_data.len(),
            "provider data retrieved"
        );

        let updates = self.merge_asset_periods(
            &provider_data,
            &previous_periods,
            chart_type,
            provider.timezone(),
            today,
        );
        let skipped_unseeded = provider_data.len().saturating_sub(updates.len());

        let mut updated_ids: Vec<&String> = updates.keys().collect();
        updated_ids.sort();
        for chunk in updated_ids.chunks(self.store_chunk_size) {
            let chunk_updates: HashMap<String, Vec<PeriodInfo>> = chunk
                .iter()
                .filter_map(|id| updates.get(*id).map(|p| ((*id).clone(), p.clone())))
                .collect();
            info!(count = chunk.len(), "storing period updates");
            store.put_periods(&chunk_updates).await?;
        }

        Ok(UpdateSummary {
            requested: asset_ids.len(),
            fetched: provider_data.len(),
            updated: updates.len(),
            skipped_unseeded,
        })
    }
}

impl Default for UpdateService {
    fn default() -> Self {
        Self::new()
    }
}
