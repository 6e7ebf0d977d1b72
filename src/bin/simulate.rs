use chrono::{SecondsFormat, Utc};
use clap::Parser;
use contribution_chase::constants::{DEMO_COLS, DEMO_ROWS};
use contribution_chase::error::SimError;
use contribution_chase::grid::{demo_counts, parse_counts_json, Grid};
use contribution_chase::history::SnapshotHistory;
use contribution_chase::rng::Rng;
use contribution_chase::run::{self, OutputMode, RunCallbacks, RunConfig};
use contribution_chase::types::{GameOverReason, RunSummary, RuntimeEvent};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file holding the activity matrix (rows of non-negative counts).
    #[arg(long)]
    grid: Option<PathBuf>,
    /// Use a synthesized contributions calendar instead of --grid.
    #[arg(long)]
    demo: bool,
    /// 32-bit run seed; larger values are rejected.
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    speed: Option<u32>,
    #[arg(long)]
    custom_start: bool,
    #[arg(long)]
    max_ticks: Option<u64>,
    /// JSON file holding a run config; flags above override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    history_out: Option<PathBuf>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    #[arg(long)]
    run_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct SimulationReport {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    seed: u32,
    #[serde(rename = "gameSpeed")]
    game_speed: u32,
    rows: usize,
    cols: usize,
    #[serde(flatten)]
    summary: RunSummary,
    #[serde(rename = "eventCounts")]
    event_counts: BTreeMap<String, usize>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let started_at = now_rfc3339();
    let (config, counts) = match resolve_inputs(&cli) {
        Ok(inputs) => inputs,
        Err(error) => {
            let run_id = cli.run_id.clone().unwrap_or_else(|| "sim-invalid".to_string());
            emit_log(
                "error",
                "invalid_input",
                &run_id,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(config.seed, now_ms()));

    emit_log(
        "info",
        "run_started",
        &run_id,
        None,
        json!({
            "seed": config.seed,
            "gameSpeed": config.game_speed,
            "rows": counts.len(),
            "cols": counts.first().map(Vec::len).unwrap_or(0),
            "customStart": config.use_custom_start_positions,
            "maxTicks": config.max_ticks,
        }),
    );

    let event_counts = Arc::new(Mutex::new(BTreeMap::<String, usize>::new()));
    let event_sink = event_counts.clone();
    let log_run_id = run_id.clone();
    let callbacks = RunCallbacks::new().on_event(move |tick, event| {
        if let Ok(mut counts) = event_sink.lock() {
            *counts.entry(event_key(event).to_string()).or_insert(0) += 1;
        }
        if let RuntimeEvent::PlayerDown { by } = event {
            emit_log("info", "player_down", &log_run_id, Some(tick), json!({ "by": by }));
        }
    });

    let output = match run::start(&counts, config.clone(), callbacks)
        .map(|handle| handle.output().cloned())
    {
        Ok(Some(output)) => output,
        Ok(None) => {
            emit_log(
                "error",
                "run_failed",
                &run_id,
                None,
                json!({ "error": "batch run produced no output" }),
            );
            std::process::exit(2);
        }
        Err(error) => {
            emit_log(
                "error",
                "run_failed",
                &run_id,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    match Grid::without_pellets(&counts) {
        Ok(grid) => {
            for (tick, message) in collect_history_anomalies(&grid, &output.history) {
                push_anomaly(&mut anomalies, &mut anomaly_records, &mut anomaly_seen, tick, message);
            }
        }
        Err(error) => push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            0,
            format!("grid could not be rebuilt: {error}"),
        ),
    }
    if output.summary.reason == GameOverReason::TickLimit {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            output.summary.ticks,
            "tick limit reached before the grid was cleared".to_string(),
        );
    }
    for anomaly in &anomaly_records {
        emit_log(
            "warn",
            "anomaly_detected",
            &run_id,
            Some(anomaly.tick),
            json!({ "message": anomaly.message }),
        );
    }

    let event_counts = event_counts
        .lock()
        .map(|counts| counts.clone())
        .unwrap_or_default();
    let report = SimulationReport {
        run_id: run_id.clone(),
        started_at,
        finished_at: now_rfc3339(),
        seed: config.seed,
        game_speed: config.game_speed,
        rows: counts.len(),
        cols: counts.first().map(Vec::len).unwrap_or(0),
        summary: output.summary.clone(),
        event_counts,
        anomalies,
    };

    if let Some(path) = cli.history_out.as_ref() {
        if let Err(error) = write_json(path, &output.history) {
            emit_log(
                "error",
                "history_write_failed",
                &run_id,
                None,
                json!({ "path": path.to_string_lossy(), "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    }

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_json(path, &report) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                json!({ "path": path.to_string_lossy(), "error": error.to_string() }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        Some(output.summary.ticks),
        json!({
            "reason": output.summary.reason,
            "frames": output.summary.frames,
            "totalPoints": output.summary.total_points,
            "anomalyCount": anomaly_records.len(),
            "summaryOut": summary_out_written,
        }),
    );

    match serde_json::to_string(&report) {
        Ok(line) => println!("{line}"),
        Err(error) => {
            emit_log(
                "error",
                "report_serialize_failed",
                &run_id,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    }

    if !report.anomalies.is_empty() {
        std::process::exit(1);
    }
}

fn resolve_inputs(cli: &Cli) -> Result<(RunConfig, Vec<Vec<u32>>), SimError> {
    let mut config = match cli.config.as_ref() {
        Some(path) => RunConfig::from_json(&read_input(path)?)?,
        None => RunConfig::default(),
    };
    config.output_mode = OutputMode::Batch;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(speed) = cli.speed {
        config.game_speed = speed;
    }
    if cli.custom_start {
        config.use_custom_start_positions = true;
    }
    if let Some(max_ticks) = cli.max_ticks {
        config.max_ticks = max_ticks;
    }
    config.validate()?;

    let counts = match (cli.grid.as_ref(), cli.demo) {
        (Some(_), true) => {
            return Err(SimError::UnsupportedConfiguration(
                "--grid and --demo are mutually exclusive".to_string(),
            ))
        }
        (Some(path), false) => parse_counts_json(&read_input(path)?)?,
        (None, _) => {
            let mut rng = Rng::new(config.seed);
            demo_counts(DEMO_ROWS, DEMO_COLS, &mut rng)
        }
    };
    Ok((config, counts))
}

fn read_input(path: &Path) -> Result<String, SimError> {
    std::fs::read_to_string(path).map_err(|error| {
        SimError::UnsupportedConfiguration(format!(
            "cannot read {}: {error}",
            path.to_string_lossy()
        ))
    })
}

/// Frame-level sanity checks: positions in bounds, the player on floor,
/// ticks strictly increasing and the score never going down.
fn collect_history_anomalies(grid: &Grid, history: &SnapshotHistory) -> Vec<(u64, String)> {
    let mut anomalies = Vec::new();
    let mut last_tick = None;
    let mut last_total = 0;
    for frame in history {
        let player = &frame.player;
        if !grid.is_passable(player.x, player.y) {
            anomalies.push((
                frame.tick,
                format!("player off the floor at ({}, {})", player.x, player.y),
            ));
        }
        for pursuer in &frame.pursuers {
            if !grid.in_bounds(pursuer.x, pursuer.y) {
                anomalies.push((
                    frame.tick,
                    format!("pursuer {} out of bounds", pursuer.identity.label()),
                ));
            }
        }
        if last_tick.is_some_and(|tick| frame.tick <= tick) {
            anomalies.push((frame.tick, "frame ticks not increasing".to_string()));
        }
        if player.total_points < last_total {
            anomalies.push((frame.tick, "total points decreased".to_string()));
        }
        last_tick = Some(frame.tick);
        last_total = player.total_points;
    }
    anomalies
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn event_key(event: &RuntimeEvent) -> &'static str {
    match event {
        RuntimeEvent::PelletEaten { .. } => "pellet_eaten",
        RuntimeEvent::PowerUpStarted { .. } => "power_up_started",
        RuntimeEvent::PowerUpEnded => "power_up_ended",
        RuntimeEvent::PursuerEaten { .. } => "pursuer_eaten",
        RuntimeEvent::PursuerRespawned { .. } => "pursuer_respawned",
        RuntimeEvent::PursuerReleased { .. } => "pursuer_released",
        RuntimeEvent::PlayerDown { .. } => "player_down",
        RuntimeEvent::PlayerRevived => "player_revived",
        RuntimeEvent::ModeChanged { .. } => "mode_changed",
        RuntimeEvent::PathFallback { .. } => "path_fallback",
        RuntimeEvent::PathBlocked { .. } => "path_blocked",
        RuntimeEvent::RunFinished { .. } => "run_finished",
    }
}

fn emit_log(level: &str, event: &str, run_id: &str, tick: Option<u64>, details: Value) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        tick,
        details,
    };
    if let Ok(line) = serde_json::to_string(&log_line) {
        eprintln!("{line}");
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contribution_chase::engine::{EngineOptions, GameEngine};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("simulate").chain(args.iter().copied()))
    }

    #[test]
    fn default_run_id_contains_seed_and_timestamp() {
        assert_eq!(default_run_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn seed_outside_u32_is_rejected() {
        let args = ["simulate", "--demo", "--seed", "4294967296"];
        assert!(Cli::try_parse_from(args).is_err());
        let cli = Cli::try_parse_from(["simulate", "--seed", "4294967295"]).expect("max seed");
        assert_eq!(cli.seed, Some(u32::MAX));
    }

    #[test]
    fn flags_override_defaults_and_demo_grid_is_used() {
        let (config, counts) =
            resolve_inputs(&cli(&["--seed", "7", "--speed", "3", "--custom-start"])).expect("inputs");
        assert_eq!(config.seed, 7);
        assert_eq!(config.game_speed, 3);
        assert!(config.use_custom_start_positions);
        assert_eq!(config.output_mode, OutputMode::Batch);
        assert_eq!(counts.len(), DEMO_ROWS);
        assert!(counts.iter().all(|row| row.len() == DEMO_COLS));
    }

    #[test]
    fn zero_speed_and_conflicting_sources_are_rejected() {
        assert!(resolve_inputs(&cli(&["--speed", "0"])).is_err());
        assert!(resolve_inputs(&cli(&["--demo", "--grid", "grid.json"])).is_err());
    }

    #[test]
    fn missing_grid_file_is_an_input_error() {
        let result = resolve_inputs(&cli(&["--grid", "/definitely/not/here.json"]));
        assert!(matches!(result, Err(SimError::UnsupportedConfiguration(_))));
    }

    #[test]
    fn clean_run_has_no_anomalies() {
        let counts = vec![vec![1u32; 9]; 7];
        let mut engine =
            GameEngine::seeded(&counts, EngineOptions::default(), 5).expect("engine");
        engine.run_to_end();
        let grid = Grid::without_pellets(&counts).expect("grid");
        assert!(collect_history_anomalies(&grid, engine.history()).is_empty());
    }

    #[test]
    fn event_keys_match_serialized_tags() {
        let event = RuntimeEvent::PowerUpStarted { x: 1, y: 2 };
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(value["type"], event_key(&event));
    }

    #[test]
    fn write_json_returns_error_when_parent_does_not_exist() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let target = std::env::temp_dir()
            .join(format!("contribution-chase-missing-{now}"))
            .join("summary.json");
        assert!(write_json(&target, &json!({ "ok": true })).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same anomaly".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same anomaly".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }
}
