use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::period::PeriodInfo;
use super::period_store::PeriodStore;

/// Directory-backed period store: one JSON document per asset id, the
/// local stand-in for the production document store.
pub struct JsonPeriodStore {
    dir: PathBuf,
}

impl JsonPeriodStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Asset ids become file names; anything outside the safe ticker
    /// alphabet is replaced so an id can never escape the store directory.
    fn document_path(&self, asset_id: &str) -> PathBuf {
        let safe: String = asset_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl PeriodStore for JsonPeriodStore {
    async fn get_periods(&self, asset_id: &str) -> Result<Option<Vec<PeriodInfo>>, EngineError> {
        let path = self.document_path(asset_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        let periods = serde_json::from_slice(&bytes)?;
        Ok(Some(periods))
    }

    async fn put_periods(
        &self,
        updates: &HashMap<String, Vec<PeriodInfo>>,
    ) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.dir)?;
        for (asset_id, periods) in updates {
            let json = serde_json::to_vec_pretty(periods)
                .map_err(|e| EngineError::Serialization(e.to_string()))?;
            std::fs::write(self.document_path(asset_id), json)?;
        }
        Ok(())
    }
}
