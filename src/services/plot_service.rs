use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use tracing::debug;

use super::chart_service::{ChartRenderer, ChartState, RenderError};
use crate::models::{ChartTarget, Config, Layout, LayoutUpdate, Margin, Trace, TraceUpdate};
use crate::utils::format::format_usd;

const X_LABEL_AREA: u32 = 30;
const Y_LABEL_AREA: u32 = 100;
const CAPTION_SIZE: u32 = 24;
const INNER_MARGIN: u32 = 5;
/// Smallest plotting cell left over once margins and label areas are taken
const MIN_PLOT_CELL: u32 = 20;

/// Chart renderer drawing PNG images with plotters.
///
/// Every create/update redraws the whole image from the retained
/// [`ChartState`], so the selected range outlives data updates.
#[derive(Debug, Default)]
pub struct PlotChart {
    state: ChartState,
}

impl PlotChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on the given range selector button (`1m`, `6m`, `ytd`, `1y`, `all`)
    pub fn with_range(label: &str) -> Result<Self, RenderError> {
        let mut chart = Self::new();
        chart.state.select_range(label)?;
        Ok(chart)
    }

    fn draw(&self, target: &ChartTarget) -> Result<(), RenderError> {
        let figure = self.state.figure().ok_or(RenderError::NotCreated)?;
        let layout = &figure.layout;
        check_fits(target, layout)?;

        let root = BitMapBackend::new(&target.path, (target.width, target.height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error)?;

        let Some((x_min, x_max)) = self.state.visible_range() else {
            root.draw(&Text::new(
                "No volume data",
                (layout.margin.l as i32, layout.margin.t as i32),
                ("sans-serif", 20).into_font(),
            ))
            .map_err(drawing_error)?;
            root.present().map_err(drawing_error)?;
            return Ok(());
        };
        let (x_min, x_max) = widen(x_min, x_max);

        self.draw_range_buttons(&root, layout)?;

        let margin = &layout.margin;
        let (top, bottom, left, right) = plot_margins(margin);
        let plot_area = root.margin(top, bottom, left, right);
        let (_, plot_height) = plot_area.dim_in_pixel();
        let split = (f64::from(plot_height) * (1.0 - layout.yaxis.domain[0])).round() as i32;
        let (main, slider) = plot_area.split_vertically(split);

        // Y range over what is visible, padded like a price chart
        let visible: Vec<Vec<(DateTime<Utc>, f64)>> = figure
            .traces
            .iter()
            .map(|t| visible_points(t, x_min, x_max))
            .collect();
        let min_volume = visible.iter().flatten().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_volume = visible.iter().flatten().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let volume_range = (max_volume - min_volume).max(1e-8);
        let padding = volume_range * 0.1;
        let y_min = (min_volume - padding).max(0.0);
        let y_max = max_volume + padding;

        let title = match (figure.traces.first(), self.state.selected()) {
            (Some(trace), Some(button)) => format!("{} [{}]", trace.name, button.display_label()),
            (Some(trace), None) => trace.name.clone(),
            (None, _) => String::new(),
        };

        let mut chart = ChartBuilder::on(&main)
            .caption(&title, ("sans-serif", CAPTION_SIZE).into_font())
            .margin(INNER_MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(drawing_error)?;

        chart
            .configure_mesh()
            .x_label_formatter(&|t: &DateTime<Utc>| t.format("%Y-%m-%d").to_string())
            .y_label_formatter(&|v: &f64| format_usd(*v))
            .draw()
            .map_err(drawing_error)?;

        for (trace, points) in figure.traces.iter().zip(&visible) {
            let color = parse_color(&trace.marker.color).unwrap_or(BLUE);
            if trace.mode.contains("lines") {
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), &color))
                    .map_err(drawing_error)?;
            }
            if trace.mode.contains("markers") {
                let size = trace.marker.size as i32;
                chart
                    .draw_series(points.iter().map(|&p| Circle::new(p, size, color.filled())))
                    .map_err(drawing_error)?;
            }
        }

        // Spike lines through the latest point of the first trace
        if layout.xaxis.showspikes {
            if let Some(&(t, v)) = visible.first().and_then(|points| points.last()) {
                let style = parse_color(&layout.xaxis.spikecolor)
                    .unwrap_or(BLACK)
                    .stroke_width(layout.xaxis.spikethickness);
                chart
                    .draw_series(std::iter::once(PathElement::new(vec![(t, y_min), (t, v)], style)))
                    .map_err(drawing_error)?;
                if layout.xaxis.spikesides {
                    chart
                        .draw_series(std::iter::once(PathElement::new(vec![(x_min, v), (t, v)], style)))
                        .map_err(drawing_error)?;
                }
            }
        }

        if layout.xaxis.rangeslider.visible {
            self.draw_range_slider(&slider, (x_min, x_max))?;
        }

        root.present().map_err(drawing_error)?;
        debug!(
            "Chart drawn to {} (responsive: {}, scroll zoom: {})",
            target.path.display(),
            figure.config.responsive,
            figure.config.scroll_zoom
        );
        Ok(())
    }

    /// Selector labels along the top margin, the active one highlighted
    fn draw_range_buttons<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, plotters::coord::Shift>,
        layout: &Layout,
    ) -> Result<(), RenderError> {
        let active = self.state.selected().map_or("all", |b| b.display_label());
        let mut x = layout.margin.l as i32;
        for button in &layout.xaxis.rangeselector.buttons {
            let label = button.display_label();
            let color = if label == active { BLUE } else { RGBColor(128, 128, 128) };
            area.draw(&Text::new(label, (x, 8), ("sans-serif", 14).into_font().color(&color)))
                .map_err(drawing_error)?;
            x += 45;
        }
        Ok(())
    }

    /// Overview of the full series with the visible window shaded
    fn draw_range_slider<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, plotters::coord::Shift>,
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<(), RenderError> {
        let (Some(figure), Some((full_min, full_max))) = (self.state.figure(), self.state.full_range()) else {
            return Ok(());
        };
        let (full_min, full_max) = widen(full_min, full_max);
        let y_top = figure
            .traces
            .iter()
            .flat_map(|t| t.y.iter().copied())
            .fold(0.0_f64, f64::max)
            .max(1e-8);

        let mut overview = ChartBuilder::on(area)
            .margin(INNER_MARGIN)
            .x_label_area_size(0)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(full_min..full_max, 0.0..y_top)
            .map_err(drawing_error)?;

        overview
            .draw_series(std::iter::once(Rectangle::new(
                [(window.0, 0.0), (window.1, y_top)],
                BLUE.mix(0.15).filled(),
            )))
            .map_err(drawing_error)?;
        overview
            .draw_series(std::iter::once(Rectangle::new(
                [(full_min, 0.0), (full_max, y_top)],
                BLACK.mix(0.3).stroke_width(1),
            )))
            .map_err(drawing_error)?;

        for trace in &figure.traces {
            let color = parse_color(&trace.marker.color).unwrap_or(BLUE);
            overview
                .draw_series(LineSeries::new(
                    trace.x.iter().copied().zip(trace.y.iter().copied()),
                    &color,
                ))
                .map_err(drawing_error)?;
        }
        Ok(())
    }
}

impl ChartRenderer for PlotChart {
    fn create(
        &mut self,
        target: &ChartTarget,
        series: &[Trace],
        layout: &Layout,
        config: &Config,
    ) -> Result<(), RenderError> {
        self.state.create(series, layout, config)?;
        self.draw(target)
    }

    fn update(
        &mut self,
        target: &ChartTarget,
        update: &TraceUpdate,
        _layout_update: &LayoutUpdate,
        trace_index: usize,
    ) -> Result<(), RenderError> {
        self.state.update(update, trace_index)?;
        self.draw(target)
    }
}

/// Layout margins in the (top, bottom, left, right) order plotters takes
fn plot_margins(margin: &Margin) -> (u32, u32, u32, u32) {
    (margin.t, margin.pad, margin.l, margin.r)
}

/// plotters panics on areas smaller than their margins, so refuse up front
fn check_fits(target: &ChartTarget, layout: &Layout) -> Result<(), RenderError> {
    let margin = &layout.margin;
    let min_width = margin.l + margin.r + Y_LABEL_AREA + 2 * INNER_MARGIN + MIN_PLOT_CELL;
    let min_height = margin.t + margin.pad + CAPTION_SIZE + X_LABEL_AREA + 2 * INNER_MARGIN + MIN_PLOT_CELL;
    if target.width < min_width || target.height < min_height {
        return Err(RenderError::Drawing(format!(
            "target {}x{} is smaller than the {}x{} the layout needs",
            target.width, target.height, min_width, min_height
        )));
    }
    Ok(())
}

fn visible_points(trace: &Trace, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<(DateTime<Utc>, f64)> {
    trace
        .x
        .iter()
        .copied()
        .zip(trace.y.iter().copied())
        .filter(|(t, _)| *t >= from && *t <= to)
        .collect()
}

/// A single-instant range cannot be plotted; give it half a day either side
fn widen(from: DateTime<Utc>, to: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    if from < to {
        (from, to)
    } else {
        (from - Duration::hours(12), to + Duration::hours(12))
    }
}

/// `#rrggbb` or one of the few named colors the layout uses
fn parse_color(spec: &str) -> Option<RGBColor> {
    match spec.trim().to_ascii_lowercase().as_str() {
        "grey" | "gray" => Some(RGBColor(128, 128, 128)),
        "black" => Some(BLACK),
        "white" => Some(WHITE),
        "blue" => Some(BLUE),
        "red" => Some(RED),
        hex => {
            let hex = hex.strip_prefix('#')?;
            if hex.len() != 6 {
                return None;
            }
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some(RGBColor((value >> 16) as u8, (value >> 8) as u8, value as u8))
        }
    }
}

fn drawing_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}
