pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::Utc;

use errors::EngineError;
use models::chart_type::ChartType;
use providers::registry::ProviderRegistry;
use services::update_service::{UpdateService, UpdateSummary};
use storage::period_store::PeriodStore;

/// Main entry point for the chartsync engine.
/// Wires the provider registry, the period store and the update pipeline.
///
/// One engine drives one sequential run at a time; concurrent runs
/// against the same assets must be serialized by the caller.
#[must_use]
pub struct ChartEngine {
    registry: ProviderRegistry,
    store: Box<dyn PeriodStore>,
    update_service: UpdateService,
}

impl std::fmt::Debug for ChartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartEngine")
            .field("origins", &self.registry.origins())
            .finish()
    }
}

impl ChartEngine {
    pub fn new(registry: ProviderRegistry, store: Box<dyn PeriodStore>) -> Self {
        Self {
            registry,
            store,
            update_service: UpdateService::new(),
        }
    }

    /// Override the provider/store chunk sizes for subsequent runs.
    pub fn with_chunk_sizes(mut self, provider_chunk_size: usize, store_chunk_size: usize) -> Self {
        self.update_service = UpdateService::with_chunk_sizes(provider_chunk_size, store_chunk_size);
        self
    }

    /// Canonical ids of every registered provider.
    pub fn origins(&self) -> Vec<String> {
        self.registry.origins()
    }

    /// Refresh one chart type for a list of assets from the given origin.
    ///
    /// Resolves the origin (aliases accepted), fetches fresh data in
    /// chunks, merges it into the stored period collections and writes
    /// the result back. See `UpdateService` for the merge contract.
    pub async fn update_charts(
        &self,
        origin: &str,
        chart_type: ChartType,
        asset_ids: &[String],
    ) -> Result<UpdateSummary, EngineError> {
        let provider = self
            .registry
            .get(origin)
            .ok_or_else(|| EngineError::UnknownOrigin(origin.to_string()))?;

        let today = Utc::now().date_naive();
        self.update_service
            .run(provider, self.store.as_ref(), chart_type, asset_ids, today)
            .await
    }
}
