use std::collections::VecDeque;

use crate::constants::{
    DEFAULT_MAX_TICKS, PELLET_POINTS, PLAYER_DEATH_DURATION, PURSUER_EATEN_BONUS,
};
use crate::error::{SimError, SimResult};
use crate::grid::Grid;
use crate::history::{Frame, SnapshotHistory};
use crate::pathfinder::{self, Step, StepSource};
use crate::rng::{RandomSource, Rng};
use crate::types::{
    DisplayState, Direction, GameMode, GameOverReason, GhostIdentity, PlayerState, PlayerView,
    PursuerView, RunSummary, RuntimeEvent, Vec2,
};

mod mode;
mod player_system;
mod pursuer_system;
mod spawn_system;
mod utils;

pub use self::mode::ModeController;
pub use self::pursuer_system::{chase_target, scatter_corner};
pub use self::spawn_system::HouseLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Speed divisor: only every `game_speed`-th tick is simulated, the others repeat the last state.
    pub game_speed: u32,
    pub use_custom_start_positions: bool,
    pub max_ticks: u64,
    pub prune_unreachable_pellets: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            game_speed: 1,
            use_custom_start_positions: false,
            max_ticks: DEFAULT_MAX_TICKS,
            prune_unreachable_pellets: true,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> SimResult<()> {
        if self.game_speed == 0 {
            return Err(SimError::UnsupportedConfiguration(
                "game speed divisor must be at least 1".to_string(),
            ));
        }
        if self.max_ticks == 0 {
            return Err(SimError::UnsupportedConfiguration(
                "tick limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct RunStats {
    pellets_eaten: u32,
    pursuers_eaten: u32,
    deaths: u32,
    power_ups: u32,
    path_fallbacks: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// Returned by exactly one call, the tick that appended the final frame.
    Finished(GameOverReason),
    /// The run was already over; nothing happened.
    Ended,
}

#[derive(Clone, Debug)]
pub struct GameEngine<R: RandomSource = Rng> {
    options: EngineOptions,
    grid: Grid,
    house: HouseLayout,
    rng: R,
    player: PlayerView,
    player_start: Vec2,
    pursuers: [PursuerView; 4],
    mode: ModeController,
    history: SnapshotHistory,
    events: Vec<RuntimeEvent>,
    stats: RunStats,
    frame_counter: u64,
    ended: bool,
    end_reason: Option<GameOverReason>,
}

impl GameEngine<Rng> {
    pub fn seeded(counts: &[Vec<u32>], options: EngineOptions, seed: u32) -> SimResult<Self> {
        Self::from_counts(counts, options, Rng::new(seed))
    }
}

impl<R: RandomSource> GameEngine<R> {
    /// Seeds pellets from `rng`, then hands the same source to the engine.
    pub fn from_counts(counts: &[Vec<u32>], options: EngineOptions, mut rng: R) -> SimResult<Self> {
        let grid = Grid::from_counts(counts, &mut rng)?;
        Self::new(grid, options, rng)
    }

    pub fn new(mut grid: Grid, options: EngineOptions, mut rng: R) -> SimResult<Self> {
        options.validate()?;
        let custom = options.use_custom_start_positions;
        let house = HouseLayout::for_grid(&grid);
        let player_start = spawn_system::pick_player_start(&grid, &house, custom, &mut rng)?;
        if options.prune_unreachable_pellets {
            let reachable = grid.reachable_from(player_start);
            grid.retain_pellets(&reachable);
        }
        let pursuers = house.formation(&grid, custom);

        let mut engine = Self {
            options,
            grid,
            house,
            rng,
            player: spawn_system::fresh_player(player_start),
            player_start,
            pursuers,
            mode: ModeController::new(),
            history: SnapshotHistory::new(),
            events: Vec::new(),
            stats: RunStats::default(),
            frame_counter: 0,
            ended: false,
            end_reason: None,
        };
        engine.place_player();
        Ok(engine)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn house(&self) -> &HouseLayout {
        &self.house
    }

    pub fn player(&self) -> &PlayerView {
        &self.player
    }

    pub fn pursuers(&self) -> &[PursuerView; 4] {
        &self.pursuers
    }

    pub fn pursuer(&self, identity: GhostIdentity) -> &PursuerView {
        &self.pursuers[identity.index()]
    }

    pub fn mode(&self) -> GameMode {
        self.mode.mode()
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn into_history(self) -> SnapshotHistory {
        self.history
    }

    pub fn tick(&self) -> u64 {
        self.frame_counter
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn end_reason(&self) -> Option<GameOverReason> {
        self.end_reason
    }

    pub fn drain_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances one tick and appends exactly one frame.
    pub fn step(&mut self) -> TickOutcome {
        if self.ended {
            return TickOutcome::Ended;
        }
        self.frame_counter += 1;

        if !self
            .frame_counter
            .is_multiple_of(u64::from(self.options.game_speed))
        {
            if self.frame_counter >= self.options.max_ticks {
                self.finish(GameOverReason::TickLimit);
                return TickOutcome::Finished(GameOverReason::TickLimit);
            }
            self.push_frame();
            return TickOutcome::Running;
        }

        self.update_player_timers();
        self.update_pursuer_timers();

        if let Some(reason) = self.check_game_over() {
            self.finish(reason);
            return TickOutcome::Finished(reason);
        }

        if !self.player.is_dead() {
            self.move_player();
            self.resolve_collisions();
        }

        if !self.player.is_dead() {
            let powered = self.player.is_powered();
            if let Some(mode) = self.mode.update(powered, &mut self.pursuers) {
                self.events.push(RuntimeEvent::ModeChanged { mode });
            }
            self.update_pursuers();
            self.resolve_collisions();
        }

        self.push_frame();
        TickOutcome::Running
    }

    /// Runs ticks back to back until the run ends.
    pub fn run_to_end(&mut self) -> GameOverReason {
        loop {
            match self.step() {
                TickOutcome::Running => continue,
                TickOutcome::Finished(reason) => return reason,
                TickOutcome::Ended => return self.end_reason.unwrap_or(GameOverReason::Cleared),
            }
        }
    }

    pub fn build_summary(&self) -> RunSummary {
        RunSummary {
            reason: self.end_reason.unwrap_or(GameOverReason::Stopped),
            ticks: self.frame_counter,
            frames: self.history.len(),
            total_points: self.player.total_points,
            pellets_eaten: self.stats.pellets_eaten,
            pursuers_eaten: self.stats.pursuers_eaten,
            deaths: self.stats.deaths,
            power_ups: self.stats.power_ups,
            path_fallbacks: self.stats.path_fallbacks,
        }
    }

    fn check_game_over(&self) -> Option<GameOverReason> {
        if self.grid.pellets_remaining() == 0 {
            return Some(GameOverReason::Cleared);
        }
        if self.frame_counter >= self.options.max_ticks {
            return Some(GameOverReason::TickLimit);
        }
        None
    }

    fn finish(&mut self, reason: GameOverReason) {
        self.ended = true;
        self.end_reason = Some(reason);
        self.events.push(RuntimeEvent::RunFinished { reason });
        self.push_frame();
    }

    fn push_frame(&mut self) {
        self.history.push(Frame {
            tick: self.frame_counter,
            mode: self.mode.mode(),
            player: self.player.clone(),
            pursuers: self.pursuers.clone(),
            pellets: self.grid.pellet_layer(),
        });
    }

    fn update_player_timers(&mut self) {
        if self.player.dead_countdown > 0 {
            self.player.dead_countdown -= 1;
            if self.player.dead_countdown == 0 {
                self.revive_player();
            }
        }

        if self.player.powerup_countdown > 0 {
            self.player.powerup_countdown -= 1;
            if self.player.powerup_countdown == 0 {
                self.end_power_up();
            }
        }
    }

    fn revive_player(&mut self) {
        self.place_player();
        self.place_pursuers();
        self.events.push(RuntimeEvent::PlayerRevived);
    }

    /// Calms every frightened pursuer and forfeits the power-up streak.
    fn end_power_up(&mut self) {
        for pursuer in self.pursuers.iter_mut() {
            if pursuer.is_frightened() {
                pursuer.display_state = DisplayState::Normal;
            }
        }
        self.player.powerup_countdown = 0;
        self.player.points = 0;
        self.sync_player_state();
        self.events.push(RuntimeEvent::PowerUpEnded);
    }

    fn sync_player_state(&mut self) {
        self.player.state = if self.player.is_dead() {
            PlayerState::Dead
        } else if self.player.is_powered() {
            PlayerState::Power
        } else {
            PlayerState::Normal
        };
    }

    fn resolve_collisions(&mut self) {
        if self.player.is_dead() {
            return;
        }
        let at = self.player.position();
        for identity in GhostIdentity::HOUSE_ORDER {
            let pursuer = &self.pursuers[identity.index()];
            if pursuer.is_eyes() || pursuer.position() != at {
                continue;
            }
            if self.player.is_powered() && pursuer.is_frightened() {
                self.eat_pursuer(identity);
            } else {
                self.down_player(identity);
                return;
            }
        }
    }

    fn eat_pursuer(&mut self, identity: GhostIdentity) {
        let respawn = self.house.respawn;
        let pursuer = &mut self.pursuers[identity.index()];
        pursuer.display_state = DisplayState::Eyes;
        pursuer.target = Some(respawn);
        self.player.points += PURSUER_EATEN_BONUS;
        self.player.total_points += PURSUER_EATEN_BONUS;
        self.stats.pursuers_eaten += 1;
        self.events.push(RuntimeEvent::PursuerEaten { identity });
    }

    fn down_player(&mut self, by: GhostIdentity) {
        if self.player.is_powered() {
            self.end_power_up();
        }
        self.player.points = 0;
        self.player.powerup_countdown = 0;
        self.player.dead_countdown = PLAYER_DEATH_DURATION;
        self.sync_player_state();
        self.stats.deaths += 1;
        self.events.push(RuntimeEvent::PlayerDown { by });
    }

    fn eat_pellet_at(&mut self, x: i32, y: i32) {
        if !self.grid.consume_pellet(x, y) {
            return;
        }
        self.player.points += PELLET_POINTS;
        self.player.total_points += PELLET_POINTS;
        self.stats.pellets_eaten += 1;
        self.events.push(RuntimeEvent::PelletEaten { x, y });
    }

    /// Moves a pursuer along a pathfinder step, recording fallbacks.
    fn apply_pursuer_step(&mut self, idx: usize, step: Step) {
        let pursuer = &mut self.pursuers[idx];
        if step.source == StepSource::RandomFallback {
            self.stats.path_fallbacks += 1;
            self.events.push(RuntimeEvent::PathFallback {
                identity: pursuer.identity,
                x: pursuer.x,
                y: pursuer.y,
            });
        }
        pursuer.x = step.x;
        pursuer.y = step.y;
        pursuer.dir = step.dir;
    }

    fn record_blocked(&mut self, idx: usize) {
        let pursuer = &self.pursuers[idx];
        self.events.push(RuntimeEvent::PathBlocked {
            identity: pursuer.identity,
            x: pursuer.x,
            y: pursuer.y,
        });
    }
}
