use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chart_type::ChartType;

/// One rendered point of a period graph.
///
/// `date` is a timezone-resolved instant (intraday samples localized in the
/// provider's reporting zone, multi-day samples anchored at synthetic
/// times of day). Serialized with the camelCase keys the period store
/// documents already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPoint {
    pub date: DateTime<Utc>,
    pub share_price: Option<f64>,
}

impl GraphPoint {
    pub fn new(date: DateTime<Utc>, share_price: Option<f64>) -> Self {
        Self { date, share_price }
    }
}

/// The stored chart data for one period label of one asset.
///
/// `graph` is kept sorted ascending (oldest first). `compare_price` is the
/// price of the first (oldest) point whenever the graph is non-empty and is
/// carried over unchanged when a refresh produces no data — replacing good
/// data with an empty fetch result is never allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodInfo {
    pub period: ChartType,
    pub graph: Vec<GraphPoint>,
    pub compare_price: Option<f64>,
}

impl PeriodInfo {
    /// Build a period entry from a freshly rendered graph, deriving
    /// `compare_price` from its first point.
    pub fn from_graph(period: ChartType, graph: Vec<GraphPoint>) -> Self {
        let compare_price = graph.first().and_then(|p| p.share_price);
        Self {
            period,
            graph,
            compare_price,
        }
    }

    /// The baseline used to seed carry-forward fills when this period is
    /// rebuilt: the price of the oldest stored point.
    pub fn baseline_price(&self) -> Option<f64> {
        self.graph.first().and_then(|p| p.share_price)
    }
}

/// Sort a period collection into the canonical display ordering
/// (1D, 1M, MTD, YTD, 12M, 5Y). Stable, so duplicate labels — which the
/// store should never contain — keep their relative order.
pub fn sort_periods(periods: &mut [PeriodInfo]) {
    periods.sort_by_key(|p| p.period.order_index());
}
