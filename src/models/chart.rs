//! Chart descriptor models
//!
//! These mirror the figure description consumed by Plotly (`newPlot` /
//! `update`) and serialize with Plotly's key names, so the same values can
//! drive the native renderer or be handed to a browser unchanged.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::{Serialize, Serializer};

/// Where a chart is drawn. Passed explicitly to the renderer on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTarget {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub color: String,
    pub size: u32,
}

/// A single named series on the chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<f64>,
    pub xaxis: String,
    pub yaxis: String,
    #[serde(rename = "type")]
    pub trace_type: String,
    pub mode: String,
    pub marker: Marker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Month,
    Year,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    Backward,
    Todate,
}

/// One button of the x-axis range selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeButton {
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepmode: Option<StepMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RangeButton {
    pub fn new(step: Step, stepmode: StepMode, count: u32, label: &str) -> Self {
        Self {
            step,
            stepmode: Some(stepmode),
            count: Some(count),
            label: Some(label.to_string()),
        }
    }

    pub fn all() -> Self {
        Self {
            step: Step::All,
            stepmode: None,
            count: None,
            label: None,
        }
    }

    /// Label shown on the button; Plotly labels the `all` step itself
    pub fn display_label(&self) -> &str {
        match (&self.label, self.step) {
            (Some(label), _) => label,
            (None, Step::All) => "all",
            (None, Step::Month) => "month",
            (None, Step::Year) => "year",
        }
    }

    /// Start of the visible window when this button is applied to a series
    /// ending at `latest`. `None` means the whole series is visible.
    pub fn window_start(&self, latest: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let count = self.count.unwrap_or(1);
        let mode = self.stepmode.unwrap_or(StepMode::Backward);

        match (self.step, mode) {
            (Step::All, _) => None,
            (Step::Month, StepMode::Backward) => latest.checked_sub_months(Months::new(count)),
            (Step::Year, StepMode::Backward) => {
                latest.checked_sub_months(Months::new(count.saturating_mul(12)))
            }
            (Step::Month, StepMode::Todate) => {
                let start = Utc
                    .with_ymd_and_hms(latest.year(), latest.month(), 1, 0, 0, 0)
                    .single()?;
                start.checked_sub_months(Months::new(count.saturating_sub(1)))
            }
            (Step::Year, StepMode::Todate) => {
                let year = latest.year() - count.saturating_sub(1) as i32;
                Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeSelector {
    pub buttons: Vec<RangeButton>,
}

impl RangeSelector {
    /// Find a button by its label, case-insensitively
    pub fn button(&self, label: &str) -> Option<&RangeButton> {
        self.buttons
            .iter()
            .find(|b| b.display_label().eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeSlider {
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub pad: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XAxis {
    pub anchor: String,
    pub rangeselector: RangeSelector,
    pub rangeslider: RangeSlider,
    pub showspikes: bool,
    pub spikecolor: String,
    pub spikesides: bool,
    pub spikethickness: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YAxis {
    pub domain: [f64; 2],
    pub anchor: String,
    pub showticklabels: bool,
    pub fixedrange: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub roworder: String,
}

/// Static chart layout, supplied once on create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub autosize: bool,
    pub margin: Margin,
    pub showlegend: bool,
    pub xaxis: XAxis,
    pub yaxis: YAxis,
    pub yaxis2: YAxis,
    pub grid: Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    pub responsive: bool,
    #[serde(rename = "scrollZoom")]
    pub scroll_zoom: bool,
}

/// New data for one existing trace.
///
/// Serialized the way `Plotly.update` expects restyle data: one array per
/// targeted trace, so `x` becomes `[[...]]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceUpdate {
    #[serde(serialize_with = "per_trace")]
    pub x: Vec<DateTime<Utc>>,
    #[serde(serialize_with = "per_trace")]
    pub y: Vec<f64>,
}

/// Layout changes sent with an update. Always empty: layout is fixed at create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutUpdate {}

fn per_trace<S, T>(values: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    std::slice::from_ref(values).serialize(serializer)
}
