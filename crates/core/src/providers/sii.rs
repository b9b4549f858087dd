use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::warn;

use crate::errors::EngineError;

const BASE_URL: &str = "https://www.sii.cl";

const PROVIDER_NAME: &str = "sii";

/// One (date, rate) row scraped from a yearly rate table.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub date: NaiveDate,
    pub price: f64,
}

/// Currency-rate provider scraping the tax authority's yearly USD/CLP
/// table (one HTML page per year, one table per month).
///
/// This is a deliberately best-effort source: rate lookups are used as
/// estimates, so an unreachable page or an empty table yields a `0.0`
/// rate instead of failing, and a missing exact date falls back to the
/// nearest published one.
///
/// Parsed year tables are cached in the adapter instance. There is no
/// invalidation rule — instantiate a fresh adapter per run.
pub struct SiiRateProvider {
    client: Client,
    base_url: String,
    year_cache: Mutex<HashMap<i32, Vec<RateRow>>>,
}

impl SiiRateProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Point the adapter at a different host (tests).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            year_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The USD/CLP rate published closest to `date`.
    ///
    /// Returns `0.0` when the year page is unreachable or carries no
    /// parseable rows.
    pub async fn usd_clp_rate(&self, date: NaiveDate) -> Result<f64, EngineError> {
        let rows = self.year_rows(date.year()).await?;
        Ok(nearest_rate(&rows, date).unwrap_or(0.0))
    }

    /// Fetch and parse the rate table for a year, caching non-empty
    /// results for the adapter's lifetime.
    async fn year_rows(&self, year: i32) -> Result<Vec<RateRow>, EngineError> {
        {
            let cache = self.year_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(rows) = cache.get(&year) {
                return Ok(rows.clone());
            }
        }

        let url = format!("{}/valores_y_fechas/dolar/dolar{year}.htm", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            warn!(
                provider = PROVIDER_NAME,
                year,
                status = %response.status(),
                "rate page unavailable"
            );
            return Ok(Vec::new());
        }

        let html = response.text().await?;
        let rows = parse_rate_table(&html, year);

        if !rows.is_empty() {
            let mut cache = self.year_cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(year, rows.clone());
        }

        Ok(rows)
    }
}

impl Default for SiiRateProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a yearly rate page: one `div.meses` block per month with an
/// `h3` month header and a day/value table. Header rows and cells that
/// do not parse as day/price are skipped; prices use comma decimals.
pub fn parse_rate_table(html: &str, year: i32) -> Vec<RateRow> {
    let document = Html::parse_document(html);

    let (Ok(month_sel), Ok(h3_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("div.meses"),
        Selector::parse("h3"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for block in document.select(&month_sel) {
        let Some(header) = block.select(&h3_sel).next() else {
            continue;
        };
        let month_name = header.text().collect::<String>();
        let Some(month) = month_number(month_name.trim()) else {
            continue;
        };

        for row in block.select(&row_sel) {
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            if cells.len() < 2 {
                continue;
            }

            let Ok(day) = cells[0].parse::<u32>() else {
                continue;
            };
            let Ok(price) = cells[1].replace(',', ".").parse::<f64>() else {
                continue;
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                rows.push(RateRow { date, price });
            }
        }
    }

    rows.sort_by_key(|r| r.date);
    rows
}

/// Spanish month header to month number.
fn month_number(name: &str) -> Option<u32> {
    match name {
        "Enero" => Some(1),
        "Febrero" => Some(2),
        "Marzo" => Some(3),
        "Abril" => Some(4),
        "Mayo" => Some(5),
        "Junio" => Some(6),
        "Julio" => Some(7),
        "Agosto" => Some(8),
        "Septiembre" => Some(9),
        "Octubre" => Some(10),
        "Noviembre" => Some(11),
        "Diciembre" => Some(12),
        _ => None,
    }
}

/// The rate of the row whose date is closest to `target` by absolute day
/// distance. Ties keep the first-encountered row.
pub fn nearest_rate(rows: &[RateRow], target: NaiveDate) -> Option<f64> {
    let mut best: Option<(i64, f64)> = None;
    for row in rows {
        let distance = (row.date - target).num_days().abs();
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, row.price));
        }
    }
    best.map(|(_, price)| price)
}
