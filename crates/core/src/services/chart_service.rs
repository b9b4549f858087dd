use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::chart_type::ChartType;
use crate::models::period::GraphPoint;
use crate::models::record::PriceRecord;

/// Converts a provider's raw series into the chart-type-specific point
/// list: timezone localization, carry-forward fill for intraday gaps,
/// synthetic close/early anchors for daily samples, and MTD/YTD
/// windowing.
///
/// The engine computes all the points — consumers just render them.
pub struct ChartService;

impl ChartService {
    pub fn new() -> Self {
        Self
    }

    /// Time-of-day anchor for settled end-of-day samples.
    fn close_anchor() -> NaiveTime {
        NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Anchor for the final (most recent) sample, captured before market
    /// close and kept visually distinct from settled points.
    fn early_anchor() -> NaiveTime {
        NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Build the graph for one chart type from canonical records.
    ///
    /// `previous_baseline` seeds the intraday carry-forward fill when the
    /// series opens with missing prices (typically the oldest stored
    /// price of the period being refreshed). `tz` is the provider's
    /// reporting zone; `today` fixes the MTD/YTD windows.
    ///
    /// The result is sorted ascending; an empty input yields an empty
    /// graph.
    pub fn build_graph(
        &self,
        chart_type: ChartType,
        records: &[PriceRecord],
        previous_baseline: Option<f64>,
        tz: Tz,
        today: NaiveDate,
    ) -> Vec<GraphPoint> {
        let mut graph = if chart_type.is_intraday() {
            Self::build_intraday(records, previous_baseline, tz)
        } else {
            Self::build_multi_day(chart_type, records, tz, today)
        };
        graph.sort_by_key(|p| p.date);
        graph
    }

    /// One point per sample; a missing price inherits the last seen
    /// non-missing one.
    fn build_intraday(
        records: &[PriceRecord],
        previous_baseline: Option<f64>,
        tz: Tz,
    ) -> Vec<GraphPoint> {
        let mut last_value = previous_baseline;
        let mut graph = Vec::with_capacity(records.len());

        for record in records {
            let share_price = record.close.or(last_value);
            if share_price.is_some() {
                last_value = share_price;
            }

            let minute = record.minute.unwrap_or(NaiveTime::MIN);
            // Local times that fall in a DST gap have no instant; drop them.
            let Some(local) = tz.from_local_datetime(&record.date.and_time(minute)).earliest()
            else {
                continue;
            };
            graph.push(GraphPoint::new(local.with_timezone(&Utc), share_price));
        }

        graph
    }

    /// One point per daily sample, anchored at the close time except for
    /// the series' final date, which gets the early anchor. Samples with
    /// no close are dropped; MTD/YTD trim to the current month/year.
    fn build_multi_day(
        chart_type: ChartType,
        records: &[PriceRecord],
        tz: Tz,
        today: NaiveDate,
    ) -> Vec<GraphPoint> {
        let Some(last_date) = records.last().map(|r| r.date) else {
            return Vec::new();
        };

        let window_start = match chart_type {
            ChartType::MonthToDate => today.with_day(1),
            ChartType::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            _ => None,
        };

        records
            .iter()
            .filter_map(|record| {
                let close = record.close?;
                if let Some(start) = window_start {
                    if record.date < start {
                        return None;
                    }
                }

                let anchor = if record.date == last_date {
                    Self::early_anchor()
                } else {
                    Self::close_anchor()
                };
                let local = tz.from_local_datetime(&record.date.and_time(anchor)).earliest()?;
                Some(GraphPoint::new(local.with_timezone(&Utc), Some(close)))
            })
            .collect()
    }
}

impl Default for ChartService {
    fn default() -> Self {
        Self::new()
    }
}
