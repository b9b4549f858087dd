use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// The canonical price record every provider adapter converges on.
///
/// Adapters map their native payloads (uppercase Spanish portal fields,
/// quote-API chart rows, Yahoo quote arrays) into this shape so the chart
/// builder and merge engine never see provider quirks.
///
/// `minute` is present only for intraday samples; `close` may be missing
/// for intraday minutes with no trades (the chart builder fills those by
/// carrying the last seen price forward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub minute: Option<NaiveTime>,
    pub close: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
}

impl PriceRecord {
    /// A daily record with only a closing price, the common multi-day case.
    pub fn daily(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            minute: None,
            close: Some(close),
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    /// An intraday record at a given minute; `close` may be absent.
    pub fn intraday(date: NaiveDate, minute: NaiveTime, close: Option<f64>) -> Self {
        Self {
            date,
            minute: Some(minute),
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}
