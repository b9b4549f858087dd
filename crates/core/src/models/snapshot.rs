use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the exchange portal's intraday price snapshot, remapped from
/// the portal's uppercase Spanish field names to canonical English ones.
///
/// Every field except the ticker is optional: the portal omits columns per
/// instrument class and absent fields must stay `None` rather than fail
/// the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    /// Ticker symbol ("NEMO")
    pub nemo: String,
    /// Last close ("PRECIO_CIERRE")
    pub close_price: Option<f64>,
    /// Best bid ("PRECIO_COMPRA")
    pub buy_price: Option<f64>,
    /// Best ask ("PRECIO_VENTA")
    pub sell_price: Option<f64>,
    /// Quoting currency ("MONEDA")
    pub currency: Option<String>,
    /// Traded amount ("MONTO")
    pub amount: Option<f64>,
    /// Index weight ("PESO")
    pub weight: Option<f64>,
    /// Units traded ("UN_TRANSADAS")
    pub traded_units: Option<f64>,
    /// Session variation ("VARIACION")
    pub variation: Option<f64>,
    /// ISIN code
    pub isin: Option<String>,
    /// Green bond flag ("BONO_VERDE")
    pub green_bond: Option<f64>,
    /// Dow Jones Sustainability Index flag ("DJSI")
    pub djsi: Option<f64>,
    /// Foreign ETF marker ("ETFs_EXTRANJERO")
    pub foreign_etf: Option<String>,
}

/// A dividend announcement from the exchange portal, reduced to the fields
/// the engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub description: String,
    pub payment_date: NaiveDate,
}
