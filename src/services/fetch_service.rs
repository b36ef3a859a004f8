use async_trait::async_trait;
use tracing::debug;

use crate::api::coingecko::{ApiError, CoinGeckoClient};
use crate::models::VolumeSeries;

/// Anything that can produce the current volume history
#[async_trait]
pub trait VolumeSource: Send + Sync {
    /// Fetch the series up to now. Errors are returned as-is, never retried here.
    async fn fetch_series(&self) -> Result<VolumeSeries, ApiError>;
}

#[async_trait]
impl VolumeSource for CoinGeckoClient {
    async fn fetch_series(&self) -> Result<VolumeSeries, ApiError> {
        let series = self.get_volume_series(None).await?;
        debug!(
            "Fetched {} volume points for {} (latest: {:?})",
            series.len(),
            self.asset(),
            series.latest()
        );
        Ok(series)
    }
}
