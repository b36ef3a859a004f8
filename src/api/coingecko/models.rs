use chrono::{TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{SeriesPoint, VolumeSeries};

/// Response from GET /coins/{id}/market_chart/range
///
/// The endpoint also returns `prices` and `market_caps` in the same
/// `[epoch_ms, value]` shape; only volumes are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartResponse {
    pub total_volumes: Vec<[f64; 2]>,
}

impl MarketChartResponse {
    /// Project `total_volumes` into parallel timestamp and volume sequences.
    /// A timestamp outside chrono's range would drop out of the chart's x
    /// values, so the whole response is rejected instead.
    pub fn into_volume_series(self) -> Result<VolumeSeries, ApiError> {
        let points = self
            .total_volumes
            .into_iter()
            .map(|[t, v]| {
                let timestamp = t as i64;
                match Utc.timestamp_millis_opt(timestamp).single() {
                    Some(_) => Ok(SeriesPoint { timestamp, volume: v }),
                    None => Err(ApiError::DeserializationError(format!(
                        "Timestamp out of range in total_volumes: {}",
                        t
                    ))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VolumeSeries::from_points(points))
    }
}

/// Nested status object used by the public API for rate limit and plan errors
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorStatus {
    pub error_message: Option<String>,
}

/// Error body returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub status: Option<ErrorStatus>,
}

impl ErrorResponse {
    pub fn message(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.status.as_ref().and_then(|s| s.error_message.clone()))
    }
}

/// Error type for market data requests
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Rate Limited. Retry after {retry_after} s")]
    RateLimited { retry_after: u64 },
    #[error("Server Error ({0}): {1}")]
    ServerError(u16, String),
    #[error("HTTP Error ({0}): {1}")]
    HttpError(u16, String),
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
}
