use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::constants::{DEFAULT_MAX_TICKS, TICK_MS};
use crate::engine::{EngineOptions, GameEngine, TickOutcome};
use crate::error::{SimError, SimResult};
use crate::history::{Frame, SnapshotHistory};
use crate::types::{GameOverReason, RunSummary, RuntimeEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "snake_case")]
pub enum OutputMode {
    /// Ticks back to back on the caller's thread; the whole history is handed over at the end.
    #[default]
    Batch,
    /// One tick per interval on a tokio task; frames are streamed as they are appended.
    Interactive,
}

impl OutputMode {
    /// `svg` and `canvas` are accepted as the renderer-facing names of the two modes.
    pub fn parse(value: &str) -> SimResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "batch" | "svg" => Ok(Self::Batch),
            "interactive" | "canvas" => Ok(Self::Interactive),
            other => Err(SimError::UnsupportedConfiguration(format!(
                "unknown output mode `{other}`"
            ))),
        }
    }
}

impl TryFrom<String> for OutputMode {
    type Error = SimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub output_mode: OutputMode,
    pub tick_ms: u64,
    pub game_speed: u32,
    pub use_custom_start_positions: bool,
    /// Forwarded to renderers; the simulation ignores it.
    pub enable_sounds: bool,
    pub seed: u32,
    pub max_ticks: u64,
    pub prune_unreachable_pellets: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::Batch,
            tick_ms: TICK_MS,
            game_speed: 1,
            use_custom_start_positions: false,
            enable_sounds: false,
            seed: 1,
            max_ticks: DEFAULT_MAX_TICKS,
            prune_unreachable_pellets: true,
        }
    }
}

impl RunConfig {
    pub fn from_json(raw: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|error| {
            SimError::UnsupportedConfiguration(format!("invalid run config: {error}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.tick_ms == 0 {
            return Err(SimError::UnsupportedConfiguration(
                "tick interval must be at least 1ms".to_string(),
            ));
        }
        self.engine_options().validate()
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            game_speed: self.game_speed,
            use_custom_start_positions: self.use_custom_start_positions,
            max_ticks: self.max_ticks,
            prune_unreachable_pellets: self.prune_unreachable_pellets,
        }
    }
}

type CompleteFn = Box<dyn FnOnce(&RunSummary) + Send>;
type HistoryFn = Box<dyn FnOnce(&SnapshotHistory) + Send>;
type PointsFn = Box<dyn FnMut(u32) + Send>;
type FrameFn = Box<dyn FnMut(&Frame) + Send>;
type EventFn = Box<dyn FnMut(u64, &RuntimeEvent) + Send>;

/// Hooks a caller can attach to a run. All are optional.
#[derive(Default)]
pub struct RunCallbacks {
    on_complete: Option<CompleteFn>,
    on_history: Option<HistoryFn>,
    on_points_changed: Option<PointsFn>,
    on_frame: Option<FrameFn>,
    on_event: Option<EventFn>,
}

impl RunCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires once, when the run ends on its own (not when it is stopped).
    pub fn on_complete(mut self, callback: impl FnOnce(&RunSummary) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Batch only: receives the full history before `on_complete`.
    pub fn on_history(mut self, callback: impl FnOnce(&SnapshotHistory) + Send + 'static) -> Self {
        self.on_history = Some(Box::new(callback));
        self
    }

    /// Receives the new total score whenever a tick changed it.
    pub fn on_points_changed(mut self, callback: impl FnMut(u32) + Send + 'static) -> Self {
        self.on_points_changed = Some(Box::new(callback));
        self
    }

    /// Interactive only: one call per appended frame.
    pub fn on_frame(mut self, callback: impl FnMut(&Frame) + Send + 'static) -> Self {
        self.on_frame = Some(Box::new(callback));
        self
    }

    /// Every runtime event with the tick that produced it.
    pub fn on_event(mut self, callback: impl FnMut(u64, &RuntimeEvent) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(callback));
        self
    }
}

#[derive(Clone, Debug)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub history: SnapshotHistory,
}

enum HandleState {
    Finished(RunOutput),
    Running {
        stop_tx: watch::Sender<bool>,
        task: JoinHandle<RunOutput>,
    },
}

/// Handle to a started run. Dropping the handle of an interactive run stops it.
pub struct RunHandle {
    state: HandleState,
}

impl RunHandle {
    /// Prevents further ticks. The tick in progress, if any, completes.
    pub fn stop(&self) {
        if let HandleState::Running { stop_tx, .. } = &self.state {
            let _ = stop_tx.send(true);
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Finished(_) => true,
            HandleState::Running { task, .. } => task.is_finished(),
        }
    }

    /// Waits for the run to end and returns what it recorded.
    pub async fn join(self) -> SimResult<RunOutput> {
        match self.state {
            HandleState::Finished(output) => Ok(output),
            HandleState::Running { stop_tx, task } => {
                let result = task.await;
                drop(stop_tx);
                result.map_err(|error| SimError::RunAborted(error.to_string()))
            }
        }
    }

    /// Batch output, available immediately after `start` returns.
    pub fn output(&self) -> Option<&RunOutput> {
        match &self.state {
            HandleState::Finished(output) => Some(output),
            HandleState::Running { .. } => None,
        }
    }
}

pub fn stop(handle: &RunHandle) {
    handle.stop();
}

/// Starts a run over `counts`. Errors are reported before any tick runs.
pub fn start(counts: &[Vec<u32>], config: RunConfig, callbacks: RunCallbacks) -> SimResult<RunHandle> {
    config.validate()?;
    if config.output_mode == OutputMode::Interactive && tokio::runtime::Handle::try_current().is_err() {
        return Err(SimError::UnsupportedConfiguration(
            "interactive mode needs a tokio runtime".to_string(),
        ));
    }
    let engine = GameEngine::seeded(counts, config.engine_options(), config.seed)?;
    let driver = Driver::new(engine, callbacks);

    let state = match config.output_mode {
        OutputMode::Batch => HandleState::Finished(driver.run_batch()),
        OutputMode::Interactive => {
            let (stop_tx, stop_rx) = watch::channel(false);
            let interval = Duration::from_millis(config.tick_ms);
            let task = tokio::spawn(driver.run_interactive(interval, stop_rx));
            HandleState::Running { stop_tx, task }
        }
    };
    Ok(RunHandle { state })
}

struct Driver {
    engine: GameEngine,
    callbacks: RunCallbacks,
    last_points: u32,
}

impl Driver {
    fn new(engine: GameEngine, callbacks: RunCallbacks) -> Self {
        let last_points = engine.player().total_points;
        Self {
            engine,
            callbacks,
            last_points,
        }
    }

    /// One tick plus its notifications. True once the run is over.
    fn tick(&mut self, stream_frames: bool) -> bool {
        let frames_before = self.engine.history().len();
        let outcome = self.engine.step();

        let tick = self.engine.tick();
        let events = self.engine.drain_events();
        if let Some(on_event) = self.callbacks.on_event.as_mut() {
            for event in &events {
                on_event(tick, event);
            }
        }

        if stream_frames && self.engine.history().len() > frames_before {
            if let (Some(on_frame), Some(frame)) =
                (self.callbacks.on_frame.as_mut(), self.engine.history().last())
            {
                on_frame(frame);
            }
        }

        let points = self.engine.player().total_points;
        if points != self.last_points {
            self.last_points = points;
            if let Some(on_points_changed) = self.callbacks.on_points_changed.as_mut() {
                on_points_changed(points);
            }
        }

        !matches!(outcome, TickOutcome::Running)
    }

    fn complete(mut self) -> RunOutput {
        let summary = self.engine.build_summary();
        let history = self.engine.into_history();
        if summary.reason != GameOverReason::Stopped {
            if let Some(on_history) = self.callbacks.on_history.take() {
                on_history(&history);
            }
            if let Some(on_complete) = self.callbacks.on_complete.take() {
                on_complete(&summary);
            }
        }
        RunOutput { summary, history }
    }

    fn run_batch(mut self) -> RunOutput {
        while !self.tick(false) {}
        self.complete()
    }

    async fn run_interactive(mut self, period: Duration, mut stop_rx: watch::Receiver<bool>) -> RunOutput {
        self.callbacks.on_history = None;
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if self.tick(true) {
                        break;
                    }
                }
            }
        }
        self.complete()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::grid::demo_counts;
    use crate::rng::Rng;

    use super::*;

    fn small_counts(seed: u32) -> Vec<Vec<u32>> {
        let mut rng = Rng::new(seed);
        demo_counts(7, 12, &mut rng)
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config = RunConfig::from_json("{}").expect("config");
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.tick_ms, 200);
        assert!(config.prune_unreachable_pellets);
    }

    #[test]
    fn parses_camel_case_fields() {
        let config = RunConfig::from_json(
            r#"{"outputMode":"canvas","gameSpeed":2,"useCustomStartPositions":true,"seed":9,"enableSounds":true}"#,
        )
        .expect("config");
        assert_eq!(config.output_mode, OutputMode::Interactive);
        assert_eq!(config.game_speed, 2);
        assert!(config.use_custom_start_positions);
        assert!(config.enable_sounds);
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn rejects_unknown_output_mode_and_zero_values() {
        assert!(matches!(
            RunConfig::from_json(r#"{"outputMode":"gif"}"#),
            Err(SimError::UnsupportedConfiguration(_))
        ));
        assert!(RunConfig::from_json(r#"{"gameSpeed":0}"#).is_err());
        assert!(RunConfig::from_json(r#"{"tickMs":0}"#).is_err());
        assert!(RunConfig::from_json(r#"{"maxTicks":0}"#).is_err());
        assert_eq!(OutputMode::parse(" SVG "), Ok(OutputMode::Batch));
    }

    #[test]
    fn empty_grid_is_reported_before_any_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let result = start(
            &[vec![0, 0], vec![0, 0]],
            RunConfig::default(),
            RunCallbacks::new().on_complete(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(matches!(result, Err(SimError::EmptyGrid)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn interactive_without_runtime_is_rejected() {
        let config = RunConfig {
            output_mode: OutputMode::Interactive,
            ..RunConfig::default()
        };
        assert!(matches!(
            start(&small_counts(1), config, RunCallbacks::new()),
            Err(SimError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn batch_run_delivers_history_and_completion_once() {
        let completions = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(AtomicUsize::new(0));
        let totals = Arc::new(Mutex::new(Vec::new()));

        let completions_seen = completions.clone();
        let frames_seen = frames.clone();
        let totals_seen = totals.clone();
        let handle = start(
            &small_counts(4),
            RunConfig {
                seed: 4,
                ..RunConfig::default()
            },
            RunCallbacks::new()
                .on_complete(move |_| {
                    completions_seen.fetch_add(1, Ordering::SeqCst);
                })
                .on_history(move |history| {
                    frames_seen.store(history.len(), Ordering::SeqCst);
                })
                .on_points_changed(move |total| {
                    if let Ok(mut guard) = totals_seen.lock() {
                        guard.push(total);
                    }
                }),
        )
        .expect("start");

        assert!(handle.is_finished());
        let output = handle.output().expect("batch output");
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(frames.load(Ordering::SeqCst), output.history.len());
        assert_eq!(output.summary.frames, output.history.len());
        assert_ne!(output.summary.reason, GameOverReason::Stopped);

        let totals = totals.lock().expect("totals").clone();
        assert!(totals.windows(2).all(|pair| pair[0] < pair[1]));
        if let Some(last) = totals.last() {
            assert_eq!(*last, output.summary.total_points);
        }
    }

    #[test]
    fn interactive_run_streams_every_frame() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let streamed = Arc::new(AtomicUsize::new(0));
            let completions = Arc::new(AtomicUsize::new(0));
            let streamed_seen = streamed.clone();
            let completions_seen = completions.clone();
            let config = RunConfig {
                output_mode: OutputMode::Interactive,
                tick_ms: 1,
                max_ticks: 300,
                ..RunConfig::default()
            };
            let handle = start(
                &small_counts(8),
                config,
                RunCallbacks::new()
                    .on_frame(move |_| {
                        streamed_seen.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_complete(move |_| {
                        completions_seen.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .expect("start");
            let output = handle.join().await.expect("join");
            assert_eq!(streamed.load(Ordering::SeqCst), output.history.len());
            assert_eq!(completions.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn stopping_prevents_further_ticks() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let completions = Arc::new(AtomicUsize::new(0));
            let completions_seen = completions.clone();
            let config = RunConfig {
                output_mode: OutputMode::Interactive,
                tick_ms: 60_000,
                ..RunConfig::default()
            };
            let handle = start(
                &small_counts(2),
                config,
                RunCallbacks::new().on_complete(move |_| {
                    completions_seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("start");
            stop(&handle);
            let output = handle.join().await.expect("join");
            assert!(output.history.len() <= 1);
            assert_eq!(output.summary.reason, GameOverReason::Stopped);
            assert_eq!(completions.load(Ordering::SeqCst), 0);
        });
    }
}
