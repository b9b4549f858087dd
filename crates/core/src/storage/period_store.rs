use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::period::PeriodInfo;

/// Keyed read/write access to an asset's stored period collection.
///
/// The engine treats the store as an opaque document collection: one
/// document per asset id holding the full `Vec<PeriodInfo>`. Writes
/// replace the whole document — points are never edited in place.
#[async_trait]
pub trait PeriodStore: Send + Sync {
    /// The stored period collection for one asset, `None` when the asset
    /// has never been seeded.
    async fn get_periods(&self, asset_id: &str) -> Result<Option<Vec<PeriodInfo>>, EngineError>;

    /// Write the full period collection for every asset in `updates`.
    async fn put_periods(
        &self,
        updates: &HashMap<String, Vec<PeriodInfo>>,
    ) -> Result<(), EngineError>;

    /// Read a batch of assets; unseeded assets are absent from the result
    /// map. The default implementation reads one document per asset.
    async fn get_periods_batch(
        &self,
        asset_ids: &[String],
    ) -> Result<HashMap<String, Vec<PeriodInfo>>, EngineError> {
        let mut result = HashMap::new();
        for asset_id in asset_ids {
            if let Some(periods) = self.get_periods(asset_id).await? {
                result.insert(asset_id.clone(), periods);
            }
        }
        Ok(result)
    }
}
