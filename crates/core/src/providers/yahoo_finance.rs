use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::warn;

use crate::errors::EngineError;
use crate::models::chart_type::ChartType;
use crate::models::record::PriceRecord;
use super::traits::MarketDataProvider;

const PROVIDER_NAME: &str = "yahoo_finance";

/// Yahoo Finance chart-API provider.
///
/// - **Free**: No API key required.
/// - **Data**: minute bars for the intraday range, daily bars otherwise.
/// - **Best effort**: any fetch or parse failure degrades to an empty
///   series with a warning — Yahoo is used for assets the primary quote
///   API does not carry, and a missing refresh must never abort a run.
///
/// Uses the `yahoo_finance_api` crate which wraps Yahoo Finance's public
/// chart endpoints.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, EngineError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| {
            EngineError::Network(format!("failed to create Yahoo connector: {e}"))
        })?;
        Ok(Self { connector })
    }

    /// The (interval, range) pair Yahoo expects for a chart type. MTD and
    /// YTD fetch their enclosing month/year window; the chart builder
    /// trims them.
    fn interval_and_range(chart_type: ChartType) -> (&'static str, &'static str) {
        match chart_type {
            ChartType::OneDay => ("1m", "1d"),
            ChartType::OneMonth | ChartType::MonthToDate => ("1d", "1mo"),
            ChartType::YearToDate | ChartType::TwelveMonths => ("1d", "1y"),
            ChartType::FiveYears => ("1d", "5y"),
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timezone(&self) -> Tz {
        chrono_tz::America::Santiago
    }

    async fn fetch_series(
        &self,
        asset_id: &str,
        chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError> {
        let (interval, range) = Self::interval_and_range(chart_type);

        let response = match self
            .connector
            .get_quote_range(asset_id, interval, range)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, asset_id, error = %e, "chart fetch failed");
                return Ok(Vec::new());
            }
        };

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, asset_id, error = %e, "no usable quotes");
                return Ok(Vec::new());
            }
        };

        let tz = self.timezone();
        let mut records: Vec<PriceRecord> = quotes
            .iter()
            .filter_map(|q| {
                let utc = chrono::DateTime::from_timestamp(q.timestamp, 0)?;
                let local = utc.with_timezone(&tz);
                let close = Some(q.close).filter(|c| c.is_finite());
                Some(PriceRecord {
                    date: local.date_naive(),
                    minute: chart_type.is_intraday().then(|| local.time()),
                    close,
                    open: Some(q.open).filter(|v| v.is_finite()),
                    high: Some(q.high).filter(|v| v.is_finite()),
                    low: Some(q.low).filter(|v| v.is_finite()),
                    volume: Some(q.volume),
                })
            })
            .collect();
        records.sort_by_key(|r| (r.date, r.minute));

        Ok(records)
    }
}
