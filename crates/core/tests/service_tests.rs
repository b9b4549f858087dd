// ═══════════════════════════════════════════════════════════════════
// Service Tests — Period Merge Engine and Batch Driver
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use chartsync_core::errors::EngineError;
use chartsync_core::models::chart_type::ChartType;
use chartsync_core::models::period::{GraphPoint, PeriodInfo};
use chartsync_core::models::record::PriceRecord;
use chartsync_core::providers::traits::MarketDataProvider;
use chartsync_core::services::update_service::UpdateService;
use chartsync_core::storage::memory::MemoryPeriodStore;
use chartsync_core::storage::period_store::PeriodStore;

const SANTIAGO: Tz = chrono_tz::America::Santiago;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn today() -> NaiveDate {
    d(2024, 3, 15)
}

fn point(s: &str, price: f64) -> GraphPoint {
    GraphPoint::new(utc(s), Some(price))
}

fn period(chart_type: ChartType, graph: Vec<GraphPoint>) -> PeriodInfo {
    PeriodInfo::from_graph(chart_type, graph)
}

// ═══════════════════════════════════════════════════════════════════
// Mock Provider / Store
// ═══════════════════════════════════════════════════════════════════

/// Serves canned records per asset and records the chunk sizes it was
/// asked for.
struct MockProvider {
    data: HashMap<String, Vec<PriceRecord>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockProvider {
    fn new(data: HashMap<String, Vec<PriceRecord>>) -> Self {
        Self {
            data,
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn timezone(&self) -> Tz {
        SANTIAGO
    }

    async fn fetch_series(
        &self,
        asset_id: &str,
        _chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError> {
        Ok(self.data.get(asset_id).cloned().unwrap_or_default())
    }

    async fn fetch_series_batch(
        &self,
        asset_ids: &[String],
        _chart_type: ChartType,
    ) -> Result<HashMap<String, Vec<PriceRecord>>, EngineError> {
        self.batch_sizes.lock().unwrap().push(asset_ids.len());
        let mut result = HashMap::new();
        for asset_id in asset_ids {
            result.insert(
                asset_id.clone(),
                self.data.get(asset_id).cloned().unwrap_or_default(),
            );
        }
        Ok(result)
    }
}

/// A provider whose batch endpoint is down.
struct FailingProvider;

#[async_trait]
impl MarketDataProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn timezone(&self) -> Tz {
        SANTIAGO
    }

    async fn fetch_series(
        &self,
        _asset_id: &str,
        _chart_type: ChartType,
    ) -> Result<Vec<PriceRecord>, EngineError> {
        Err(EngineError::ProviderUnavailable {
            provider: "failing".into(),
            status: 503,
        })
    }
}

/// Records the size of every write it receives.
struct CountingStore {
    inner: MemoryPeriodStore,
    put_sizes: Mutex<Vec<usize>>,
}

impl CountingStore {
    fn new(inner: MemoryPeriodStore) -> Self {
        Self {
            inner,
            put_sizes: Mutex::new(Vec::new()),
        }
    }

    fn put_sizes(&self) -> Vec<usize> {
        self.put_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeriodStore for CountingStore {
    async fn get_periods(&self, asset_id: &str) -> Result<Option<Vec<PeriodInfo>>, EngineError> {
        self.inner.get_periods(asset_id).await
    }

    async fn put_periods(
        &self,
        updates: &HashMap<String, Vec<PeriodInfo>>,
    ) -> Result<(), EngineError> {
        self.put_sizes.lock().unwrap().push(updates.len());
        self.inner.put_periods(updates).await
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Merge Engine
// ═══════════════════════════════════════════════════════════════════

mod merge {
    use super::*;

    #[test]
    fn empty_fetch_never_overwrites_stored_data() {
        let stored = period(ChartType::OneMonth, vec![point("2024-01-01T19:00:00Z", 100.0)]);
        let previous = HashMap::from([("AAPL".to_string(), vec![stored.clone()])]);
        let provider_data = HashMap::from([("AAPL".to_string(), Vec::new())]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );

        assert_eq!(result["AAPL"], vec![stored]);
        assert_eq!(result["AAPL"][0].compare_price, Some(100.0));
    }

    #[test]
    fn non_empty_rebuild_replaces_graph_and_compare_price() {
        let previous = HashMap::from([(
            "AAPL".to_string(),
            vec![period(
                ChartType::TwelveMonths,
                vec![point("2023-05-02T20:00:00Z", 40.0)],
            )],
        )]);
        let provider_data = HashMap::from([(
            "AAPL".to_string(),
            vec![
                PriceRecord::daily(d(2024, 3, 1), 50.0),
                PriceRecord::daily(d(2024, 3, 5), 55.0),
            ],
        )]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::TwelveMonths,
            SANTIAGO,
            today(),
        );

        let merged = &result["AAPL"][0];
        assert_eq!(merged.period, ChartType::TwelveMonths);
        assert_eq!(merged.graph.len(), 2);
        // 2024-03-01 is a settled day (16:00 local), 2024-03-05 is the
        // most recent capture (01:00 local); Santiago is UTC-3 in March.
        assert_eq!(merged.graph[0].date, utc("2024-03-01T19:00:00Z"));
        assert_eq!(merged.graph[1].date, utc("2024-03-05T04:00:00Z"));
        assert_eq!(merged.compare_price, Some(50.0));
    }

    #[test]
    fn periods_other_than_the_target_pass_through_untouched() {
        let one_day = period(ChartType::OneDay, vec![point("2024-03-14T13:31:00Z", 9.0)]);
        let five_years = period(ChartType::FiveYears, vec![point("2019-06-03T20:00:00Z", 5.0)]);
        let one_month = period(ChartType::OneMonth, vec![point("2024-02-20T19:00:00Z", 8.0)]);
        let previous = HashMap::from([(
            "AAPL".to_string(),
            vec![one_day.clone(), one_month, five_years.clone()],
        )]);
        let provider_data = HashMap::from([(
            "AAPL".to_string(),
            vec![PriceRecord::daily(d(2024, 3, 1), 50.0)],
        )]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );

        let merged = &result["AAPL"];
        assert_eq!(merged[0], one_day);
        assert_eq!(merged[2], five_years);
        assert_eq!(merged[1].compare_price, Some(50.0));
    }

    #[test]
    fn unseeded_assets_are_skipped() {
        let previous: HashMap<String, Vec<PeriodInfo>> =
            HashMap::from([("EMPTY".to_string(), Vec::new())]);
        let provider_data = HashMap::from([
            (
                "MISSING".to_string(),
                vec![PriceRecord::daily(d(2024, 3, 1), 50.0)],
            ),
            (
                "EMPTY".to_string(),
                vec![PriceRecord::daily(d(2024, 3, 1), 50.0)],
            ),
        ]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );

        assert!(result.is_empty());
    }

    #[test]
    fn missing_label_is_appended_in_canonical_order() {
        let previous = HashMap::from([(
            "AAPL".to_string(),
            vec![
                period(ChartType::OneDay, vec![point("2024-03-14T13:31:00Z", 9.0)]),
                period(ChartType::FiveYears, vec![point("2019-06-03T20:00:00Z", 5.0)]),
            ],
        )]);
        let provider_data = HashMap::from([(
            "AAPL".to_string(),
            vec![
                PriceRecord::daily(d(2024, 3, 1), 50.0),
                PriceRecord::daily(d(2024, 3, 5), 55.0),
            ],
        )]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );

        let labels: Vec<&str> = result["AAPL"].iter().map(|p| p.period.label()).collect();
        assert_eq!(labels, vec!["1D", "1M", "5Y"]);
        assert_eq!(result["AAPL"][1].compare_price, Some(50.0));
    }

    #[test]
    fn merging_twice_with_identical_data_is_idempotent() {
        let previous = HashMap::from([(
            "AAPL".to_string(),
            vec![period(
                ChartType::OneMonth,
                vec![point("2024-02-20T19:00:00Z", 48.0)],
            )],
        )]);
        let provider_data = HashMap::from([(
            "AAPL".to_string(),
            vec![
                PriceRecord::daily(d(2024, 3, 1), 50.0),
                PriceRecord::daily(d(2024, 3, 5), 55.0),
            ],
        )]);

        let service = UpdateService::new();
        let once = service.merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );
        let twice = service.merge_asset_periods(
            &provider_data,
            &once,
            ChartType::OneMonth,
            SANTIAGO,
            today(),
        );

        assert_eq!(once, twice);
    }

    #[test]
    fn intraday_rebuild_seeds_baseline_from_stored_graph() {
        let previous = HashMap::from([(
            "AAPL".to_string(),
            vec![period(
                ChartType::OneDay,
                vec![point("2024-03-14T13:31:00Z", 99.0)],
            )],
        )]);
        let provider_data = HashMap::from([(
            "AAPL".to_string(),
            vec![
                PriceRecord::intraday(d(2024, 3, 15), t(9, 30), None),
                PriceRecord::intraday(d(2024, 3, 15), t(9, 31), Some(101.0)),
            ],
        )]);

        let result = UpdateService::new().merge_asset_periods(
            &provider_data,
            &previous,
            ChartType::OneDay,
            SANTIAGO,
            today(),
        );

        let merged = &result["AAPL"][0];
        let prices: Vec<Option<f64>> = merged.graph.iter().map(|p| p.share_price).collect();
        assert_eq!(prices, vec![Some(99.0), Some(101.0)]);
        assert_eq!(merged.compare_price, Some(99.0));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Batch Driver
// ═══════════════════════════════════════════════════════════════════

mod driver {
    use super::*;

    fn provider_for(assets: &[&str]) -> MockProvider {
        let data = assets
            .iter()
            .map(|a| {
                (
                    a.to_string(),
                    vec![
                        PriceRecord::daily(d(2024, 3, 1), 50.0),
                        PriceRecord::daily(d(2024, 3, 5), 55.0),
                    ],
                )
            })
            .collect();
        MockProvider::new(data)
    }

    fn seeded_store(assets: &[&str]) -> MemoryPeriodStore {
        let store = MemoryPeriodStore::new();
        for asset in assets {
            store.seed(
                *asset,
                vec![period(
                    ChartType::OneMonth,
                    vec![point("2024-02-20T19:00:00Z", 48.0)],
                )],
            );
        }
        store
    }

    #[tokio::test]
    async fn run_merges_and_stores_seeded_assets_only() {
        let provider = provider_for(&["AAPL", "MSFT"]);
        let store = seeded_store(&["AAPL"]);
        let assets = vec!["AAPL".to_string(), "MSFT".to_string()];

        let summary = UpdateService::new()
            .run(&provider, &store, ChartType::OneMonth, &assets, today())
            .await
            .unwrap();

        assert_eq!(summary.requested, 2);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped_unseeded, 1);

        let stored = store.snapshot();
        assert_eq!(stored["AAPL"][0].compare_price, Some(50.0));
        assert!(!stored.contains_key("MSFT"));
    }

    #[tokio::test]
    async fn provider_and_store_requests_are_chunked() {
        let assets: Vec<String> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let names: Vec<&str> = assets.iter().map(|s| s.as_str()).collect();
        let provider = provider_for(&names);
        let store = CountingStore::new(seeded_store(&names));

        let summary = UpdateService::with_chunk_sizes(2, 2)
            .run(&provider, &store, ChartType::OneMonth, &assets, today())
            .await
            .unwrap();

        assert_eq!(summary.updated, 5);
        assert_eq!(provider.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(store.put_sizes(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn provider_failure_aborts_the_run() {
        let store = seeded_store(&["AAPL"]);
        let assets = vec!["AAPL".to_string()];

        let result = UpdateService::new()
            .run(&FailingProvider, &store, ChartType::OneMonth, &assets, today())
            .await;

        match result {
            Err(EngineError::ProviderUnavailable { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
        // Nothing was written.
        assert_eq!(store.snapshot()["AAPL"][0].compare_price, Some(48.0));
    }

    #[tokio::test]
    async fn empty_provider_payload_keeps_stored_periods() {
        let provider = MockProvider::new(HashMap::from([("AAPL".to_string(), Vec::new())]));
        let store = seeded_store(&["AAPL"]);
        let assets = vec!["AAPL".to_string()];

        let summary = UpdateService::new()
            .run(&provider, &store, ChartType::OneMonth, &assets, today())
            .await
            .unwrap();

        assert_eq!(summary.updated, 1);
        let stored = store.snapshot();
        assert_eq!(stored["AAPL"][0].compare_price, Some(48.0));
        assert_eq!(stored["AAPL"][0].graph.len(), 1);
    }
}
