pub mod chart_service;
pub mod dashboard_service;
pub mod display_service;
pub mod fetch_service;
pub mod plot_service;

pub use dashboard_service::Dashboard;
pub use display_service::ConsoleDisplay;
pub use plot_service::PlotChart;
