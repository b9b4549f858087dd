use std::collections::HashMap;

use async_trait::async_trait;
use chrono_tz::Tz;

use crate::errors::EngineError;
use crate::models::chart_type::ChartType;
use crate::models::record::PriceRecord;

/// Trait abstraction for all market-data providers.
///
/// Each upstream source (exchange portal, quote API, Yahoo chart API)
/// implements this trait. If a source stops working or changes shape, we
/// replace only that one adapter — the chart builder and merge engine are
/// untouched.
///
/// Hard failures (failed session handshake, non-success HTTP status)
/// surface as errors and abort the current chunk. Data-shape mismatches
/// and per-asset timeouts degrade to empty results instead, so a single
/// bad asset never poisons a batch.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Canonical origin id of this provider (e.g. "iex_cloud"). Used as
    /// the registry key and in logs and errors.
    fn name(&self) -> &str;

    /// The IANA zone this provider reports timestamps in. Intraday
    /// samples and synthetic multi-day anchor times are localized here
    /// before being converted to UTC instants.
    fn timezone(&self) -> Tz;

    /// Fetch the raw series for one asset and chart type, mapped into
    /// canonical records.
    async fn fetch_series(
        &self,
        asset_id: &str,
        chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError>;

    /// Fetch series for a chunk of assets. The default implementation
    /// issues one `fetch_series` call per asset; providers with a native
    /// batch endpoint override it with a single request.
    async fn fetch_series_batch(
        &self,
        asset_ids: &[String],
        chart_type: ChartType,
    ) -> Result<HashMap<String, Vec<PriceRecord>>, EngineError> {
        let mut result = HashMap::new();
        for asset_id in asset_ids {
            let records = self.fetch_series(asset_id, chart_type).await?;
            result.insert(asset_id.clone(), records);
        }
        Ok(result)
    }
}
