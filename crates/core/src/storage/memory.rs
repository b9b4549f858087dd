use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::period::PeriodInfo;
use super::period_store::PeriodStore;

/// In-memory period store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryPeriodStore {
    entries: Mutex<HashMap<String, Vec<PeriodInfo>>>,
}

impl MemoryPeriodStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate one asset's stored periods.
    pub fn seed(&self, asset_id: impl Into<String>, periods: Vec<PeriodInfo>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(asset_id.into(), periods);
    }

    /// A copy of everything currently stored.
    pub fn snapshot(&self) -> HashMap<String, Vec<PeriodInfo>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clone()
    }
}

#[async_trait]
impl PeriodStore for MemoryPeriodStore {
    async fn get_periods(&self, asset_id: &str) -> Result<Option<Vec<PeriodInfo>>, EngineError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(asset_id).cloned())
    }

    async fn put_periods(
        &self,
        updates: &HashMap<String, Vec<PeriodInfo>>,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (asset_id, periods) in updates {
            entries.insert(asset_id.clone(), periods.clone());
        }
        Ok(())
    }
}
