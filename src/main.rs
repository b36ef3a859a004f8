use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod api;
mod models;
mod services;
mod utils;

use api::coingecko::CoinGeckoClient;
use models::ChartTarget;
use services::{ConsoleDisplay, Dashboard, PlotChart};
use utils::DashboardSettings;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    let mut filter = EnvFilter::from_default_env();
    for directive in ["volume_dashboard=debug", "reqwest=warn", "hyper=warn"] {
        match directive.parse::<Directive>() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Invalid log directive {}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("📈 Starting volume dashboard v{}", env!("CARGO_PKG_VERSION"));

    let settings = match DashboardSettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!(
        "Tracking {} volume (USD) since {} from {}",
        settings.asset,
        settings.from,
        settings.api_url.as_deref().unwrap_or(CoinGeckoClient::DEFAULT_BASE_URL)
    );

    let client = match settings.api_url.clone() {
        Some(url) => CoinGeckoClient::with_base_url(url, settings.asset.clone(), settings.from),
        None => CoinGeckoClient::new(settings.asset.clone(), settings.from),
    };
    let renderer = match PlotChart::with_range(&settings.initial_range) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to set up chart: {}", e);
            return;
        }
    };
    let target = ChartTarget {
        path: settings.chart_path.clone(),
        width: settings.chart_width,
        height: settings.chart_height,
    };

    let handle = Dashboard::new(
        client,
        renderer,
        ConsoleDisplay::stdout(),
        target,
        settings.refresh_interval,
    )
    .mount();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutting down...");
    if handle.current().is_loading() {
        warn!("Shutting down before the first refresh completed");
    }
    handle.unmount().await;
}
