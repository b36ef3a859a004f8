//! Data models for the volume dashboard
//!
//! Series data produced by the fetcher, chart descriptors consumed by the
//! renderer, and the view state published by the controller.

pub mod chart;
pub mod display;
pub mod series;

// Re-export commonly used types for convenience
pub use chart::{
    ChartTarget, Config, Grid, LayoutUpdate, Layout, Margin, Marker, RangeButton, RangeSelector,
    RangeSlider, Step, StepMode, Trace, TraceUpdate, XAxis, YAxis,
};
pub use display::{DisplayState, ViewState};
pub use series::{SeriesPoint, VolumeSeries};
