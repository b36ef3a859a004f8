use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    ChartTarget, Config, Grid, Layout, LayoutUpdate, Margin, Marker, RangeButton, RangeSelector,
    RangeSlider, Step, StepMode, Trace, TraceUpdate, VolumeSeries, XAxis, YAxis,
};

pub const VOLUME_TRACE_NAME: &str = "Volume ($)";
/// The dashboard draws a single trace, always at this index
pub const VOLUME_TRACE_INDEX: usize = 0;
pub const VOLUME_COLOR: &str = "#0d6efd";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Chart has not been created")]
    NotCreated,
    #[error("No trace at index {0}")]
    UnknownTrace(usize),
    #[error("Trace has {x} x values but {y} y values")]
    LengthMismatch { x: usize, y: usize },
    #[error("Unknown range selector button '{0}'")]
    UnknownRange(String),
    #[error("Drawing failed: {0}")]
    Drawing(String),
}

/// A chart backend. `create` draws a chart from scratch; `update` swaps the
/// data of one existing trace and keeps everything else (layout, config,
/// selected range) as it was.
pub trait ChartRenderer: Send {
    fn create(
        &mut self,
        target: &ChartTarget,
        series: &[Trace],
        layout: &Layout,
        config: &Config,
    ) -> Result<(), RenderError>;

    fn update(
        &mut self,
        target: &ChartTarget,
        update: &TraceUpdate,
        layout_update: &LayoutUpdate,
        trace_index: usize,
    ) -> Result<(), RenderError>;
}

/// Scatter trace (lines + markers) for the volume history
pub fn volume_trace(series: &VolumeSeries) -> Trace {
    Trace {
        name: VOLUME_TRACE_NAME.to_string(),
        x: series.datetimes(),
        y: series.volumes().to_vec(),
        xaxis: "x".to_string(),
        yaxis: "y1".to_string(),
        trace_type: "scatter".to_string(),
        mode: "lines+markers".to_string(),
        marker: Marker {
            color: VOLUME_COLOR.to_string(),
            size: 3,
        },
    }
}

/// Range selector buttons: 1m, 6m, YTD, 1y, all
pub fn range_buttons() -> Vec<RangeButton> {
    vec![
        RangeButton::new(Step::Month, StepMode::Backward, 1, "1m"),
        RangeButton::new(Step::Month, StepMode::Backward, 6, "6m"),
        RangeButton::new(Step::Year, StepMode::Todate, 1, "YTD"),
        RangeButton::new(Step::Year, StepMode::Backward, 1, "1y"),
        RangeButton::all(),
    ]
}

/// Main plot on the top 90%, range slider row below it
pub fn volume_layout() -> Layout {
    Layout {
        autosize: true,
        margin: Margin { l: 50, r: 20, t: 35, pad: 3 },
        showlegend: false,
        xaxis: XAxis {
            anchor: "y2".to_string(),
            rangeselector: RangeSelector { buttons: range_buttons() },
            rangeslider: RangeSlider { visible: true },
            showspikes: true,
            spikecolor: "grey".to_string(),
            spikesides: true,
            spikethickness: 1,
        },
        yaxis: YAxis {
            domain: [0.1, 1.0],
            anchor: "x".to_string(),
            showticklabels: true,
            fixedrange: true,
        },
        yaxis2: YAxis {
            domain: [0.0, 0.1],
            anchor: "x".to_string(),
            showticklabels: false,
            fixedrange: true,
        },
        grid: Grid {
            roworder: "bottom to top".to_string(),
        },
    }
}

pub fn volume_config() -> Config {
    Config {
        responsive: true,
        scroll_zoom: true,
    }
}

/// Fresh x/y arrays for the existing volume trace
pub fn volume_update(series: &VolumeSeries) -> TraceUpdate {
    TraceUpdate {
        x: series.datetimes(),
        y: series.volumes().to_vec(),
    }
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub traces: Vec<Trace>,
    pub layout: Layout,
    pub config: Config,
}

/// Renderer-side chart state: the figure plus the selected x range.
///
/// The selection is stored as a button, not as fixed dates, so the window
/// follows the newest data while staying on the same zoom level.
#[derive(Debug, Clone, Default)]
pub struct ChartState {
    figure: Option<Figure>,
    selected: Option<RangeButton>,
    pending_range: Option<String>,
}

impl ChartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    pub fn selected(&self) -> Option<&RangeButton> {
        self.selected.as_ref()
    }

    pub fn create(&mut self, series: &[Trace], layout: &Layout, config: &Config) -> Result<(), RenderError> {
        for trace in series {
            check_lengths(trace.x.len(), trace.y.len())?;
        }
        self.figure = Some(Figure {
            traces: series.to_vec(),
            layout: layout.clone(),
            config: *config,
        });

        if let Some(label) = self.pending_range.take() {
            self.select_range(&label)?;
        }
        Ok(())
    }

    pub fn update(&mut self, update: &TraceUpdate, trace_index: usize) -> Result<(), RenderError> {
        check_lengths(update.x.len(), update.y.len())?;
        let figure = self.figure.as_mut().ok_or(RenderError::NotCreated)?;
        let trace = figure
            .traces
            .get_mut(trace_index)
            .ok_or(RenderError::UnknownTrace(trace_index))?;
        trace.x = update.x.clone();
        trace.y = update.y.clone();
        Ok(())
    }

    /// Apply a range selector button by label. Before the chart exists the
    /// label is remembered and applied on create.
    pub fn select_range(&mut self, label: &str) -> Result<(), RenderError> {
        if self.figure.is_none() {
            self.pending_range = Some(label.to_string());
            return Ok(());
        }
        let button = self
            .figure
            .as_ref()
            .ok_or(RenderError::NotCreated)?
            .layout
            .xaxis
            .rangeselector
            .button(label)
            .ok_or_else(|| RenderError::UnknownRange(label.to_string()))?;

        self.selected = match button.step {
            Step::All => None,
            _ => Some(button.clone()),
        };
        Ok(())
    }

    /// Full x extent of the first trace
    pub fn full_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let trace = self.figure.as_ref()?.traces.first()?;
        let first = *trace.x.iter().min()?;
        let last = *trace.x.iter().max()?;
        Some((first, last))
    }

    /// Currently visible x range
    pub fn visible_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (first, last) = self.full_range()?;
        let start = self
            .selected
            .as_ref()
            .and_then(|b| b.window_start(last))
            .map_or(first, |start| start.max(first));
        Some((start, last))
    }
}

fn check_lengths(x: usize, y: usize) -> Result<(), RenderError> {
    if x != y {
        return Err(RenderError::LengthMismatch { x, y });
    }
    Ok(())
}
