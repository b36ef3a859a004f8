pub mod format;
pub mod settings;

pub use settings::DashboardSettings;
