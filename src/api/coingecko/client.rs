use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use super::models::{ApiError, ErrorResponse, MarketChartResponse};
use crate::models::VolumeSeries;

/// Seconds to wait when a 429 carries no usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// CoinGecko market data client scoped to one asset priced in USD
pub struct CoinGeckoClient {
    http_client: HttpClient,
    base_url: String,
    asset: String,
    from: i64,
}

impl CoinGeckoClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";
    pub const VS_CURRENCY: &'static str = "usd";

    /// Create a client for `asset`, requesting history starting at `from` (epoch seconds)
    pub fn new(asset: String, from: i64) -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL.to_string(), asset, from)
    }

    /// Create a client against a custom base URL (mirrors, pro endpoint, testing)
    pub fn with_base_url(base_url: String, asset: String, from: i64) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            asset,
            from,
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    fn create_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    fn market_chart_url(&self) -> String {
        format!("{}/coins/{}/market_chart/range", self.base_url, self.asset)
    }

    /// Query string for a range request ending at `to` (epoch seconds)
    fn range_query(&self, to: i64) -> [(&'static str, String); 3] {
        [
            ("vs_currency", Self::VS_CURRENCY.to_string()),
            ("from", self.from.to_string()),
            ("to", to.to_string()),
        ]
    }

    /// GET /coins/{id}/market_chart/range
    ///
    /// `to` bounds the range in epoch seconds; `None` means now.
    pub async fn get_market_chart(&self, to: Option<i64>) -> Result<MarketChartResponse, ApiError> {
        let to = to.unwrap_or_else(|| chrono::Utc::now().timestamp());
        let url = self.market_chart_url();
        debug!("GET {} (from={}, to={})", url, self.from, to);

        let response = self
            .http_client
            .get(&url)
            .headers(Self::create_headers())
            .query(&self.range_query(to))
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after, &body));
        }

        response
            .json::<MarketChartResponse>()
            .await
            .map_err(|e| ApiError::DeserializationError(format!("Failed to parse response: {}", e)))
    }

    /// Fetch the volume history and project it into parallel sequences
    pub async fn get_volume_series(&self, to: Option<i64>) -> Result<VolumeSeries, ApiError> {
        self.get_market_chart(to).await?.into_volume_series()
    }
}

/// Map a non-success response to an error, preferring the API's own message
fn error_for_status(status: u16, retry_after: Option<u64>, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.message())
        .unwrap_or_else(|| body.to_string());

    match status {
        400 => ApiError::BadRequest(message),
        401 => ApiError::Unauthorized(message),
        403 => ApiError::Forbidden(message),
        404 => ApiError::NotFound(message),
        429 => {
            let retry_after = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("Rate limited by market data API, retry after {} s", retry_after);
            ApiError::RateLimited { retry_after }
        }
        500..=599 => {
            warn!("Server error {}: {}", status, message);
            ApiError::ServerError(status, message)
        }
        _ => ApiError::HttpError(status, message),
    }
}
