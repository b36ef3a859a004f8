use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::chart_service::{
    volume_config, volume_layout, volume_trace, volume_update, ChartRenderer, RenderError,
    VOLUME_TRACE_INDEX,
};
use super::display_service::{VolumeDisplay, FLASH_CLASS};
use super::fetch_service::VolumeSource;
use crate::api::coingecko::ApiError;
use crate::models::{ChartTarget, DisplayState, LayoutUpdate, ViewState};
use crate::utils::format::format_usd;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to fetch volume data: {0}")]
    Fetch(#[from] ApiError),
    #[error("Failed to render chart: {0}")]
    Render(#[from] RenderError),
}

/// The volume view: fetches on mount, then once per `refresh_interval`,
/// creating the chart on the first success and updating it afterwards.
pub struct Dashboard<S, R, D> {
    source: S,
    renderer: R,
    display: D,
    target: ChartTarget,
    refresh_interval: Duration,
    chart_created: bool,
    state: DisplayState,
}

impl<S, R, D> Dashboard<S, R, D>
where
    S: VolumeSource + 'static,
    R: ChartRenderer + 'static,
    D: VolumeDisplay + 'static,
{
    pub fn new(source: S, renderer: R, display: D, target: ChartTarget, refresh_interval: Duration) -> Self {
        Self {
            source,
            renderer,
            display,
            target,
            refresh_interval,
            chart_created: false,
            state: DisplayState::default(),
        }
    }

    /// Start the view. The returned handle is the only way to stop it.
    pub fn mount(self) -> DashboardHandle {
        let (state_tx, state_rx) = watch::channel(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!(
            "Mounting volume dashboard (refresh every {}s, chart at {})",
            self.refresh_interval.as_secs(),
            self.target.path.display()
        );
        let task = tokio::spawn(self.run(state_tx, shutdown_rx));

        DashboardHandle {
            task,
            shutdown: shutdown_tx,
            state: state_rx,
        }
    }

    async fn run(mut self, state_tx: watch::Sender<DisplayState>, mut shutdown: oneshot::Receiver<()>) {
        self.display.show_loading();

        // One timer per mounted view; first tick one period after mount
        let mut timer = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::select! {
            _ = &mut shutdown => return,
            _ = self.cycle(&state_tx) => {}
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    debug!("Refresh tick");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = self.cycle(&state_tx) => {}
                    }
                }
            }
        }
        debug!("Dashboard task stopped");
    }

    /// One fetch-and-render cycle, publishing the resulting state
    async fn cycle(&mut self, state_tx: &watch::Sender<DisplayState>) {
        match self.refresh().await {
            Ok(latest) => {
                if let Some(value) = latest {
                    // Remove first so re-adding replays the animation
                    self.display.remove_class(FLASH_CLASS);
                    self.display.show_volume(&value);
                    self.display.add_class(FLASH_CLASS);
                    self.state.latest_volume = Some(value);
                }
                if self.state.view != ViewState::Ready {
                    info!("Dashboard ready (latest volume: {:?})", self.state.latest_volume);
                }
                self.state.view = ViewState::Ready;
            }
            Err(e) => {
                match &e {
                    DashboardError::Fetch(_) => warn!("{}", e),
                    DashboardError::Render(_) => error!("{}", e),
                }
                let reason = e.to_string();
                self.display.show_failure(&reason);
                self.state.view = ViewState::Failed { reason };
            }
        }
        state_tx.send_replace(self.state.clone());
    }

    /// Fetch, then create or update the chart. Returns the formatted latest
    /// volume, or `None` when the series came back empty.
    async fn refresh(&mut self) -> Result<Option<String>, DashboardError> {
        let series = self.source.fetch_series().await?;
        if series.is_empty() {
            warn!("Market data returned no volume points");
        }

        if self.chart_created {
            self.renderer.update(
                &self.target,
                &volume_update(&series),
                &LayoutUpdate::default(),
                VOLUME_TRACE_INDEX,
            )?;
            debug!("Chart updated with {} points", series.len());
        } else {
            self.renderer.create(
                &self.target,
                &[volume_trace(&series)],
                &volume_layout(),
                &volume_config(),
            )?;
            self.chart_created = true;
            info!("Chart created with {} points", series.len());
        }

        Ok(series.latest().map(|p| format_usd(p.volume)))
    }
}

/// Owner of a mounted dashboard. Not `Clone`: only the creator can unmount.
/// Dropping the handle also stops the view.
pub struct DashboardHandle {
    task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    state: watch::Receiver<DisplayState>,
}

impl DashboardHandle {
    /// Subscribe to display state changes
    pub fn state(&self) -> watch::Receiver<DisplayState> {
        self.state.clone()
    }

    pub fn current(&self) -> DisplayState {
        self.state.borrow().clone()
    }

    /// Cancel the refresh timer and wait for the view task to finish.
    /// An in-flight fetch is dropped and never reaches the display.
    pub async fn unmount(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!("Dashboard task failed: {}", e);
        }
        info!("Dashboard unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, Layout, SeriesPoint, Trace, TraceUpdate, VolumeSeries};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    const REFRESH: Duration = Duration::from_secs(30);

    fn series(points: &[(i64, f64)]) -> VolumeSeries {
        VolumeSeries::from_points(points.iter().map(|&(timestamp, volume)| SeriesPoint { timestamp, volume }))
    }

    fn target() -> ChartTarget {
        ChartTarget {
            path: PathBuf::from("unused.png"),
            width: 800,
            height: 600,
        }
    }

    /// Replays scripted responses; the last one repeats forever
    #[derive(Clone)]
    struct ScriptedSource {
        script: Arc<Mutex<VecDeque<Result<VolumeSeries, ApiError>>>>,
        fetches: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<VolumeSeries, ApiError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                fetches: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VolumeSource for ScriptedSource {
        async fn fetch_series(&self) -> Result<VolumeSeries, ApiError> {
            self.fetches.lock().unwrap().push(Instant::now());
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    /// Takes `delay` to answer, counting fetches that started and finished
    #[derive(Clone)]
    struct SlowSource {
        delay: Duration,
        started: Arc<Mutex<usize>>,
        finished: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl VolumeSource for SlowSource {
        async fn fetch_series(&self) -> Result<VolumeSeries, ApiError> {
            *self.started.lock().unwrap() += 1;
            tokio::time::sleep(self.delay).await;
            *self.finished.lock().unwrap() += 1;
            Ok(series(&[(1000, 5.0), (2000, 7.25)]))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum RenderCall {
        Create { traces: Vec<Trace>, layout: Layout, config: Config },
        Update { update: TraceUpdate, layout_update: LayoutUpdate, trace_index: usize },
    }

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        calls: Arc<Mutex<Vec<RenderCall>>>,
        fail_creates: Arc<Mutex<usize>>,
    }

    impl RecordingRenderer {
        fn calls(&self) -> Vec<RenderCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChartRenderer for RecordingRenderer {
        fn create(
            &mut self,
            _target: &ChartTarget,
            series: &[Trace],
            layout: &Layout,
            config: &Config,
        ) -> Result<(), RenderError> {
            let mut failures = self.fail_creates.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RenderError::Drawing("backend unavailable".to_string()));
            }
            self.calls.lock().unwrap().push(RenderCall::Create {
                traces: series.to_vec(),
                layout: layout.clone(),
                config: *config,
            });
            Ok(())
        }

        fn update(
            &mut self,
            _target: &ChartTarget,
            update: &TraceUpdate,
            layout_update: &LayoutUpdate,
            trace_index: usize,
        ) -> Result<(), RenderError> {
            self.calls.lock().unwrap().push(RenderCall::Update {
                update: update.clone(),
                layout_update: layout_update.clone(),
                trace_index,
            });
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum DisplayOp {
        Loading,
        Volume(String),
        Failure(String),
        Remove(String),
        Add(String),
    }

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        ops: Arc<Mutex<Vec<DisplayOp>>>,
    }

    impl RecordingDisplay {
        fn ops(&self) -> Vec<DisplayOp> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl VolumeDisplay for RecordingDisplay {
        fn show_loading(&mut self) {
            self.ops.lock().unwrap().push(DisplayOp::Loading);
        }
        fn show_volume(&mut self, formatted: &str) {
            self.ops.lock().unwrap().push(DisplayOp::Volume(formatted.to_string()));
        }
        fn show_failure(&mut self, reason: &str) {
            self.ops.lock().unwrap().push(DisplayOp::Failure(reason.to_string()));
        }
        fn remove_class(&mut self, class: &str) {
            self.ops.lock().unwrap().push(DisplayOp::Remove(class.to_string()));
        }
        fn add_class(&mut self, class: &str) {
            self.ops.lock().unwrap().push(DisplayOp::Add(class.to_string()));
        }
    }

    fn mount(
        script: Vec<Result<VolumeSeries, ApiError>>,
    ) -> (DashboardHandle, ScriptedSource, RecordingRenderer, RecordingDisplay) {
        let source = ScriptedSource::new(script);
        let renderer = RecordingRenderer::default();
        let display = RecordingDisplay::default();
        let handle = Dashboard::new(source.clone(), renderer.clone(), display.clone(), target(), REFRESH).mount();
        (handle, source, renderer, display)
    }

    fn is_create(call: &RenderCall) -> bool {
        matches!(call, RenderCall::Create { .. })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_creates_chart_and_shows_latest() {
        let (handle, _source, renderer, display) = mount(vec![Ok(series(&[(1000, 5.0), (2000, 7.25)]))]);
        assert!(handle.current().is_loading());

        let mut state = handle.state();
        state.changed().await.unwrap();
        let current = state.borrow().clone();
        assert_eq!(current.view, ViewState::Ready);
        assert_eq!(current.latest_volume.as_deref(), Some("7.25"));

        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            RenderCall::Create { traces, layout, config } => {
                assert_eq!(traces.len(), 1);
                assert_eq!(traces[0].y, vec![5.0, 7.25]);
                assert_eq!(traces[0].x.len(), 2);
                assert_eq!(*layout, volume_layout());
                assert!(config.scroll_zoom);
            }
            other => panic!("expected create, got {other:?}"),
        }

        assert_eq!(
            display.ops(),
            vec![
                DisplayOp::Loading,
                DisplayOp::Remove(FLASH_CLASS.to_string()),
                DisplayOp::Volume("7.25".to_string()),
                DisplayOp::Add(FLASH_CLASS.to_string()),
            ]
        );
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_volume_is_grouped() {
        let (handle, _source, _renderer, _display) = mount(vec![Ok(series(&[(1000, 1234567.891)]))]);
        let mut state = handle.state();
        state.changed().await.unwrap();
        assert_eq!(state.borrow().latest_volume.as_deref(), Some("1,234,567.89"));
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_update_instead_of_create() {
        let (handle, source, renderer, _display) = mount(vec![
            Ok(series(&[(1000, 1.0)])),
            Ok(series(&[(1000, 1.0), (2000, 2.0)])),
            Ok(series(&[(1000, 1.0), (2000, 2.0), (3000, 3.5)])),
        ]);
        let mut state = handle.state();
        for _ in 0..3 {
            state.changed().await.unwrap();
        }
        assert_eq!(state.borrow().latest_volume.as_deref(), Some("3.50"));

        let calls = renderer.calls();
        assert_eq!(calls.len(), 3);
        assert!(is_create(&calls[0]));
        assert_eq!(calls.iter().filter(|c| is_create(c)).count(), 1);

        let expected_y = [vec![1.0, 2.0], vec![1.0, 2.0, 3.5]];
        for (call, y) in calls[1..].iter().zip(expected_y) {
            match call {
                RenderCall::Update { update, layout_update, trace_index } => {
                    assert_eq!(*trace_index, VOLUME_TRACE_INDEX);
                    assert_eq!(*layout_update, LayoutUpdate::default());
                    assert_eq!(update.y, y);
                    assert_eq!(update.x.len(), update.y.len());
                }
                other => panic!("expected update, got {other:?}"),
            }
        }

        let fetches = source.fetches.lock().unwrap().clone();
        assert_eq!(fetches[1] - fetches[0], REFRESH);
        assert_eq!(fetches[2] - fetches[1], REFRESH);
        drop(state);
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_timer() {
        let (handle, source, renderer, _display) = mount(vec![Ok(series(&[(1000, 5.0)]))]);
        let mut state = handle.state();
        state.changed().await.unwrap();
        handle.unmount().await;

        tokio::time::sleep(REFRESH * 10).await;
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(renderer.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_view() {
        let (handle, source, _renderer, _display) = mount(vec![Ok(series(&[(1000, 5.0)]))]);
        let mut state = handle.state();
        state.changed().await.unwrap();
        drop(handle);

        tokio::time::sleep(REFRESH * 5).await;
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_and_next_tick_recovers() {
        let (handle, _source, renderer, display) = mount(vec![
            Err(ApiError::ServerError(503, "unavailable".to_string())),
            Ok(series(&[(1000, 5.0), (2000, 7.25)])),
        ]);
        let mut state = handle.state();

        state.changed().await.unwrap();
        let failed = state.borrow().clone();
        assert!(matches!(failed.view, ViewState::Failed { ref reason } if reason.contains("503")));
        assert_eq!(failed.latest_volume, None);
        assert!(renderer.calls().is_empty());
        assert!(display.ops().iter().any(|op| matches!(op, DisplayOp::Failure(_))));

        state.changed().await.unwrap();
        assert_eq!(state.borrow().view, ViewState::Ready);
        assert_eq!(state.borrow().latest_volume.as_deref(), Some("7.25"));
        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        assert!(is_create(&calls[0]));
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_ready_keeps_value_and_updates_on_recovery() {
        let (handle, _source, renderer, _display) = mount(vec![
            Ok(series(&[(1000, 5.0)])),
            Err(ApiError::RequestError("connection reset".to_string())),
            Ok(series(&[(1000, 5.0), (2000, 6.0)])),
        ]);
        let mut state = handle.state();

        state.changed().await.unwrap();
        state.changed().await.unwrap();
        let failed = state.borrow().clone();
        assert!(matches!(failed.view, ViewState::Failed { .. }));
        assert_eq!(failed.latest_volume.as_deref(), Some("5.00"));

        state.changed().await.unwrap();
        assert_eq!(state.borrow().view, ViewState::Ready);
        let calls = renderer.calls();
        assert_eq!(calls.len(), 2);
        assert!(is_create(&calls[0]));
        assert!(!is_create(&calls[1]));
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_is_retried_on_next_tick() {
        let source = ScriptedSource::new(vec![Ok(series(&[(1000, 5.0)]))]);
        let renderer = RecordingRenderer::default();
        *renderer.fail_creates.lock().unwrap() = 1;
        let handle = Dashboard::new(source, renderer.clone(), RecordingDisplay::default(), target(), REFRESH).mount();
        let mut state = handle.state();

        state.changed().await.unwrap();
        assert!(matches!(state.borrow().view, ViewState::Failed { .. }));

        state.changed().await.unwrap();
        assert_eq!(state.borrow().view, ViewState::Ready);
        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        assert!(is_create(&calls[0]));
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_series_creates_chart_without_value() {
        let (handle, _source, renderer, display) = mount(vec![Ok(VolumeSeries::default())]);
        let mut state = handle.state();
        state.changed().await.unwrap();

        assert_eq!(state.borrow().view, ViewState::Ready);
        assert_eq!(state.borrow().latest_volume, None);
        assert_eq!(renderer.calls().len(), 1);
        assert_eq!(display.ops(), vec![DisplayOp::Loading]);
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_during_fetch_never_touches_view() {
        let source = SlowSource {
            delay: Duration::from_secs(10),
            started: Arc::new(Mutex::new(0)),
            finished: Arc::new(Mutex::new(0)),
        };
        let renderer = RecordingRenderer::default();
        let display = RecordingDisplay::default();
        let handle = Dashboard::new(source.clone(), renderer.clone(), display.clone(), target(), REFRESH).mount();
        let state = handle.state();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*source.started.lock().unwrap(), 1);
        handle.unmount().await;

        tokio::time::sleep(REFRESH * 4).await;
        assert_eq!(*source.started.lock().unwrap(), 1);
        assert_eq!(*source.finished.lock().unwrap(), 0);
        assert!(renderer.calls().is_empty());
        assert_eq!(display.ops(), vec![DisplayOp::Loading]);
        assert_eq!(state.borrow().view, ViewState::Loading);
    }
}
