use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::errors::EngineError;
use crate::models::chart_type::ChartType;
use crate::models::record::PriceRecord;
use super::traits::MarketDataProvider;

const BASE_URL: &str = "https://cloud.iexapis.com/stable";

const PROVIDER_NAME: &str = "iex_cloud";

/// Quote-API provider (IEX Cloud).
///
/// - **Requires**: API token, passed as a query parameter.
/// - **Batch**: one request fetches charts for a whole chunk of symbols
///   (`/stock/market/batch?symbols=a,b,c&types=chart&range=…`).
/// - **Data**: minute bars for the `1d` range, daily bars otherwise.
///
/// Symbols the API does not recognize are simply absent from the response
/// map; callers treat absence as "no data" for that asset.
pub struct IexCloudProvider {
    client: Client,
    token: String,
    base_url: String,
}

impl IexCloudProvider {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    /// Point the adapter at a different API host (tests).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            token,
            base_url,
        }
    }
}

// ── Quote-API response types ────────────────────────────────────────

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Option<Vec<ChartRow>>,
}

#[derive(Deserialize)]
struct ChartRow {
    date: Option<String>,
    minute: Option<String>,
    close: Option<f64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    volume: Option<u64>,
}

impl ChartRow {
    /// Map to a canonical record. The API writes dates either dashed
    /// (`2024-03-05`) or compact (`20240305`); rows with no parseable
    /// date are dropped, a missing close stays missing so the chart
    /// builder can carry-forward fill it.
    fn into_record(self) -> Option<PriceRecord> {
        let raw = self.date?;
        let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y%m%d"))
            .ok()?;
        let minute = self
            .minute
            .as_deref()
            .and_then(|m| NaiveTime::parse_from_str(m, "%H:%M").ok());
        Some(PriceRecord {
            date,
            minute,
            close: self.close,
            open: self.open,
            high: self.high,
            low: self.low,
            volume: self.volume,
        })
    }
}

#[async_trait]
impl MarketDataProvider for IexCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timezone(&self) -> Tz {
        chrono_tz::America::New_York
    }

    async fn fetch_series(
        &self,
        asset_id: &str,
        chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError> {
        let mut batch = self
            .fetch_series_batch(&[asset_id.to_string()], chart_type)
            .await?;
        Ok(batch.remove(asset_id).unwrap_or_default())
    }

    /// One real batch request per chunk of symbols.
    async fn fetch_series_batch(
        &self,
        asset_ids: &[String],
        chart_type: ChartType,
    ) -> Result<HashMap<String, Vec<PriceRecord>>, EngineError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/stock/market/batch", self.base_url);
        let symbols = asset_ids.join(",");

        let response = match self
            .client
            .get(&url)
            .query(&[
                ("token", self.token.as_str()),
                ("symbols", symbols.as_str()),
                ("types", "chart"),
                ("range", chart_type.range_token()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(provider = PROVIDER_NAME, symbols = %symbols, "batch request timed out");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable {
                provider: PROVIDER_NAME.into(),
                status: response.status().as_u16(),
            });
        }

        let body: HashMap<String, ChartEnvelope> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, error = %e, "malformed batch response");
                return Ok(HashMap::new());
            }
        };

        let result = body
            .into_iter()
            .map(|(symbol, envelope)| {
                let records = envelope
                    .chart
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(ChartRow::into_record)
                    .collect();
                (symbol, records)
            })
            .collect();

        Ok(result)
    }
}
