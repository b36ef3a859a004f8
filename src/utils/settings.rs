//! Dashboard settings loaded from the environment (after `.env`)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::api::coingecko::CoinGeckoClient;

pub const DEFAULT_ASSET: &str = "woo-network";
/// 2020-10-30T15:28:17Z, the start of the volume history
pub const DEFAULT_FROM: i64 = 1604071697;
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const DEFAULT_CHART_PATH: &str = "volume_chart.png";
pub const DEFAULT_CHART_WIDTH: u32 = 1280;
pub const DEFAULT_CHART_HEIGHT: u32 = 720;
pub const DEFAULT_RANGE: &str = "all";
/// Smallest image that still fits the margins, label areas and slider row
pub const MIN_CHART_WIDTH: u32 = 320;
pub const MIN_CHART_HEIGHT: u32 = 200;

const RANGE_LABELS: [&str; 5] = ["1m", "6m", "ytd", "1y", "all"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("Unsupported quote currency '{0}', only 'usd' is supported")]
    UnsupportedCurrency(String),
    #[error("Unknown range '{0}'. Supported: 1m, 6m, ytd, 1y, all")]
    UnknownRange(String),
    #[error("Chart size {width}x{height} is too small, minimum is {min_width}x{min_height}")]
    ChartTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    /// `None` uses the public API
    pub api_url: Option<String>,
    pub asset: String,
    /// Start of the requested range, epoch seconds
    pub from: i64,
    pub refresh_interval: Duration,
    pub chart_path: PathBuf,
    pub chart_width: u32,
    pub chart_height: u32,
    /// Range selector button applied when the chart is created
    pub initial_range: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            asset: DEFAULT_ASSET.to_string(),
            from: DEFAULT_FROM,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
            initial_range: DEFAULT_RANGE.to_string(),
        }
    }
}

impl DashboardSettings {
    /// Read settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(url) = lookup("COINGECKO_API_URL") {
            settings.api_url = Some(url);
        }
        if let Some(asset) = lookup("VOLUME_ASSET") {
            let asset = asset.trim().to_lowercase();
            if asset.is_empty() {
                return Err(ConfigError::InvalidValue { key: "VOLUME_ASSET", value: asset });
            }
            settings.asset = asset;
        }
        if let Some(currency) = lookup("VOLUME_VS_CURRENCY") {
            if !currency.eq_ignore_ascii_case(CoinGeckoClient::VS_CURRENCY) {
                return Err(ConfigError::UnsupportedCurrency(currency));
            }
        }
        if let Some(from) = lookup("VOLUME_FROM") {
            settings.from = parse("VOLUME_FROM", &from)?;
        }
        if let Some(secs) = lookup("VOLUME_REFRESH_SECS") {
            let secs: u64 = parse("VOLUME_REFRESH_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "VOLUME_REFRESH_SECS",
                    value: secs.to_string(),
                });
            }
            settings.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("VOLUME_CHART_PATH") {
            settings.chart_path = PathBuf::from(path);
        }
        if let Some(width) = lookup("VOLUME_CHART_WIDTH") {
            settings.chart_width = parse("VOLUME_CHART_WIDTH", &width)?;
        }
        if let Some(height) = lookup("VOLUME_CHART_HEIGHT") {
            settings.chart_height = parse("VOLUME_CHART_HEIGHT", &height)?;
        }
        if settings.chart_width < MIN_CHART_WIDTH || settings.chart_height < MIN_CHART_HEIGHT {
            return Err(ConfigError::ChartTooSmall {
                width: settings.chart_width,
                height: settings.chart_height,
                min_width: MIN_CHART_WIDTH,
                min_height: MIN_CHART_HEIGHT,
            });
        }
        if let Some(range) = lookup("VOLUME_RANGE") {
            let range = range.trim().to_lowercase();
            if !RANGE_LABELS.contains(&range.as_str()) {
                return Err(ConfigError::UnknownRange(range));
            }
            settings.initial_range = range;
        }

        Ok(settings)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
