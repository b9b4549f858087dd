use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::errors::EngineError;
use crate::models::chart_type::ChartType;
use crate::models::record::PriceRecord;
use crate::models::snapshot::{Dividend, EquitySnapshot};
use super::traits::MarketDataProvider;

const BASE_URL: &str = "https://www.bolsadesantiago.com";

const CSRF_ENDPOINT: &str = "/api/Securities/csrfToken";
const SNAPSHOT_ENDPOINT: &str = "/api/RV_ResumenMercado/getAccionesPrecios";
const HISTORY_ENDPOINT: &str = "/api/RV_Instrumentos/getPointHistGAT";
const DIVIDENDS_ENDPOINT: &str = "/api/RV_ResumenMercado/getDividendos";

const PROVIDER_NAME: &str = "bolsa_santiago";

/// Exchange-portal provider for the Santiago stock exchange.
///
/// - **Session-based**: the portal issues a CSRF token that must be
///   fetched once and attached as `X-CSRF-Token` to every data request;
///   the underlying session cookie is kept by the client's cookie store.
/// - **Snapshot**: intraday prices for every listed instrument, keyed by
///   uppercase Spanish field names that are remapped to canonical ones.
/// - **History**: full daily OHLCV series per ticker (no range parameter;
///   the chart builder windows MTD/YTD).
/// - **Dividends**: corporate-action records filtered by description and
///   payment date.
///
/// The token is cached for the adapter's lifetime. It is not refreshed
/// automatically — call `reset_session` (or build a fresh adapter per
/// run) when the portal starts rejecting it.
pub struct BolsaSantiagoProvider {
    client: Client,
    base_url: String,
    csrf_token: Mutex<Option<String>>,
}

impl BolsaSantiagoProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Point the adapter at a different portal host (tests).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .default_headers(Self::default_headers(&base_url))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            csrf_token: Mutex::new(None),
        }
    }

    /// The browser-shaped headers the portal expects on every call.
    fn default_headers(base_url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
        );
        if let Ok(origin) = HeaderValue::from_str(base_url) {
            headers.insert(header::ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(&format!("{base_url}/acciones_precios")) {
            headers.insert(header::REFERER, referer);
        }
        headers
    }

    /// Drop the cached CSRF token; the next request re-handshakes.
    pub fn reset_session(&self) {
        let mut token = self.csrf_token.lock().unwrap_or_else(|e| e.into_inner());
        *token = None;
    }

    /// Return the session token, performing the handshake on first use.
    ///
    /// Nothing is cached unless the handshake fully succeeds, so a failed
    /// attempt leaves no partial session state behind.
    async fn csrf_token(&self) -> Result<String, EngineError> {
        {
            let cached = self.csrf_token.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
        }

        let token = self.handshake().await?;

        let mut cached = self.csrf_token.lock().unwrap_or_else(|e| e.into_inner());
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn handshake(&self) -> Result<String, EngineError> {
        let url = format!("{}{CSRF_ENDPOINT}", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            EngineError::AuthFailure {
                provider: PROVIDER_NAME.into(),
                message: format!("token request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            return Err(EngineError::AuthFailure {
                provider: PROVIDER_NAME.into(),
                message: format!("token endpoint returned HTTP {}", response.status().as_u16()),
            });
        }

        let body: CsrfResponse = response.json().await.map_err(|e| {
            EngineError::AuthFailure {
                provider: PROVIDER_NAME.into(),
                message: format!("malformed token response: {e}"),
            }
        })?;

        match body.csrf {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(EngineError::AuthFailure {
                provider: PROVIDER_NAME.into(),
                message: "token response had no csrf field".into(),
            }),
        }
    }

    /// Fetch the intraday price snapshot for every listed instrument,
    /// optionally filtered to a set of tickers.
    ///
    /// A malformed body degrades to an empty snapshot; only a non-success
    /// status is a hard failure.
    pub async fn fetch_price_snapshot(
        &self,
        nemos: Option<&[String]>,
    ) -> Result<Vec<EquitySnapshot>, EngineError> {
        let token = self.csrf_token().await?;
        let url = format!("{}{SNAPSHOT_ENDPOINT}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("X-CSRF-Token", &token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable {
                provider: PROVIDER_NAME.into(),
                status: response.status().as_u16(),
            });
        }

        let body: ListaResult<SnapshotRow> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, error = %e, "malformed snapshot response");
                return Ok(Vec::new());
            }
        };

        let rows = body.lista_result.unwrap_or_default();
        let snapshots = rows
            .into_iter()
            .filter_map(SnapshotRow::into_snapshot)
            .filter(|s| match nemos {
                Some(wanted) => wanted.iter().any(|n| n == &s.nemo),
                None => true,
            })
            .collect();

        Ok(snapshots)
    }

    /// Fetch dividend announcements for a ticker, keeping only records
    /// whose description mentions a dividend and whose payment date falls
    /// inside `[from, to]`.
    pub async fn fetch_dividends(
        &self,
        nemo: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Dividend>, EngineError> {
        let token = self.csrf_token().await?;
        let url = format!("{}{DIVIDENDS_ENDPOINT}", self.base_url);

        let response = match self
            .client
            .post(&url)
            .header("X-CSRF-Token", &token)
            .json(&serde_json::json!({ "nemo": nemo }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(provider = PROVIDER_NAME, nemo, "dividends request timed out");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable {
                provider: PROVIDER_NAME.into(),
                status: response.status().as_u16(),
            });
        }

        let body: ListaResult<DividendRow> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, nemo, error = %e, "malformed dividends response");
                return Ok(Vec::new());
            }
        };

        let dividends = body
            .lista_result
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| row.into_dividend())
            .filter(|d| d.description.to_lowercase().contains("divid"))
            .filter(|d| d.payment_date >= from && d.payment_date <= to)
            .collect();

        Ok(dividends)
    }
}

impl Default for BolsaSantiagoProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Portal response types ───────────────────────────────────────────
//
// The portal wraps every payload in a `listaResult` array and names
// fields in uppercase Spanish. Fields outside these dictionaries are
// dropped by serde; mapped fields that are absent become `None`.

#[derive(Deserialize)]
struct CsrfResponse {
    csrf: Option<String>,
}

#[derive(Deserialize)]
struct ListaResult<T> {
    #[serde(rename = "listaResult")]
    lista_result: Option<Vec<T>>,
}

#[derive(Deserialize)]
struct SnapshotRow {
    #[serde(rename = "NEMO")]
    nemo: Option<String>,
    #[serde(rename = "PRECIO_CIERRE")]
    close_price: Option<f64>,
    #[serde(rename = "PRECIO_COMPRA")]
    buy_price: Option<f64>,
    #[serde(rename = "PRECIO_VENTA")]
    sell_price: Option<f64>,
    #[serde(rename = "MONEDA")]
    currency: Option<String>,
    #[serde(rename = "MONTO")]
    amount: Option<f64>,
    #[serde(rename = "PESO")]
    weight: Option<f64>,
    #[serde(rename = "UN_TRANSADAS")]
    traded_units: Option<f64>,
    #[serde(rename = "VARIACION")]
    variation: Option<f64>,
    #[serde(rename = "ISIN")]
    isin: Option<String>,
    #[serde(rename = "BONO_VERDE")]
    green_bond: Option<f64>,
    #[serde(rename = "DJSI")]
    djsi: Option<f64>,
    #[serde(rename = "ETFs_EXTRANJERO")]
    foreign_etf: Option<String>,
}

impl SnapshotRow {
    /// Rows without a ticker are unusable and dropped.
    fn into_snapshot(self) -> Option<EquitySnapshot> {
        Some(EquitySnapshot {
            nemo: self.nemo?,
            close_price: self.close_price,
            buy_price: self.buy_price,
            sell_price: self.sell_price,
            currency: self.currency,
            amount: self.amount,
            weight: self.weight,
            traded_units: self.traded_units,
            variation: self.variation,
            isin: self.isin,
            green_bond: self.green_bond,
            djsi: self.djsi,
            foreign_etf: self.foreign_etf,
        })
    }
}

#[derive(Deserialize)]
struct HistoryRow {
    #[serde(rename = "DATE")]
    date: Option<String>,
    #[serde(rename = "CLOSE")]
    close: Option<f64>,
    #[serde(rename = "ADJ_CLOSE")]
    adj_close: Option<f64>,
    #[serde(rename = "OPEN")]
    open: Option<f64>,
    #[serde(rename = "HIGH")]
    high: Option<f64>,
    #[serde(rename = "LOW")]
    low: Option<f64>,
    #[serde(rename = "VOLUME")]
    volume: Option<u64>,
}

impl HistoryRow {
    /// Map to a canonical record; rows whose date cannot be parsed are
    /// dropped. The portal sends dates either plain (`2024-03-05`) or as
    /// a longer timestamp with the date in front.
    fn into_record(self) -> Option<PriceRecord> {
        let raw = self.date?;
        let date = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
        Some(PriceRecord {
            date,
            minute: None,
            close: self.close.or(self.adj_close),
            open: self.open,
            high: self.high,
            low: self.low,
            volume: self.volume,
        })
    }
}

#[derive(Deserialize)]
struct DividendRow {
    descrip_vc: Option<String>,
    fec_pago: Option<String>,
}

impl DividendRow {
    fn into_dividend(self) -> Option<Dividend> {
        let description = self.descrip_vc?;
        let raw = self.fec_pago?;
        let payment_date = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
        Some(Dividend {
            description,
            payment_date,
        })
    }
}

#[async_trait]
impl MarketDataProvider for BolsaSantiagoProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timezone(&self) -> Tz {
        chrono_tz::America::Santiago
    }

    /// The history endpoint has no range parameter: it always returns the
    /// full daily series and ignores `chart_type`. A request timeout
    /// degrades to an empty series so one slow ticker cannot abort a run.
    async fn fetch_series(
        &self,
        asset_id: &str,
        _chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError> {
        let token = self.csrf_token().await?;
        let url = format!("{}{HISTORY_ENDPOINT}", self.base_url);

        let response = match self
            .client
            .get(&url)
            .header("X-CSRF-Token", &token)
            .query(&[("nemo", asset_id)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(provider = PROVIDER_NAME, asset_id, "history request timed out");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable {
                provider: PROVIDER_NAME.into(),
                status: response.status().as_u16(),
            });
        }

        let body: ListaResult<HistoryRow> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = PROVIDER_NAME, asset_id, error = %e, "malformed history response");
                return Ok(Vec::new());
            }
        };

        let mut records: Vec<PriceRecord> = body
            .lista_result
            .unwrap_or_default()
            .into_iter()
            .filter_map(HistoryRow::into_record)
            .collect();
        records.sort_by_key(|r| r.date);

        Ok(records)
    }
}
