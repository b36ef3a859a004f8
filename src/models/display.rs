//! View state models

/// Lifecycle of a mounted dashboard view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// No fetch has completed yet
    #[default]
    Loading,
    /// The chart exists and the last cycle succeeded
    Ready,
    /// The last cycle failed; the next tick retries
    Failed { reason: String },
}

/// What the user currently sees
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub view: ViewState,
    /// Latest volume, formatted without the currency symbol
    pub latest_volume: Option<String>,
}

impl DisplayState {
    pub fn is_loading(&self) -> bool {
        self.view == ViewState::Loading
    }
}
