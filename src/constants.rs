use crate::types::GameMode;

/// Wall-clock length of one tick in interactive mode.
pub const TICK_MS: u64 = 200;
pub const TICKS_PER_SECOND: u64 = 1000 / TICK_MS;

pub const SCATTER_MODE_TICKS: u32 = 7 * TICKS_PER_SECOND as u32;
pub const CHASE_MODE_TICKS: u32 = 20 * TICKS_PER_SECOND as u32;

pub const POWERUP_DURATION: u32 = 30;
pub const PLAYER_DEATH_DURATION: u32 = 10;
pub const PURSUER_RESPAWN_DURATION: u32 = 1;
pub const PURSUER_EATEN_BONUS: u32 = 10;
pub const PELLET_POINTS: u32 = 1;

pub const PELLET_PROBABILITY: f32 = 0.3;
pub const RECENT_POSITIONS_LIMIT: usize = 8;

pub const FRIGHTENED_TARGET_RADIUS: i32 = 8;
pub const FRIGHTENED_RANDOM_MOVE_CHANCE: f32 = 0.5;
pub const FRIGHTENED_SKIP_CHANCE: f32 = 0.6;

pub const PINKY_LOOKAHEAD: i32 = 4;
pub const INKY_LOOKAHEAD: i32 = 2;
pub const CLYDE_FLEE_DISTANCE: i32 = 8;

pub const HOUSE_DOOR_Y: i32 = 2;
pub const HOUSE_TOP_Y: i32 = 3;
pub const HOUSE_BOTTOM_Y: i32 = 4;
pub const RELEASE_DELAY_STEP: u32 = 10;

pub const DEFAULT_PLAYER_START: (i32, i32) = (1, 1);
pub const DEFAULT_MAX_TICKS: u64 = 50_000;

pub const DEMO_ROWS: usize = 7;
pub const DEMO_COLS: usize = 53;

pub fn get_mode_duration(mode: GameMode) -> u32 {
    match mode {
        GameMode::Scatter => SCATTER_MODE_TICKS,
        GameMode::Chase => CHASE_MODE_TICKS,
    }
}

/// Release delay for the pursuer placed at `slot` in the house formation.
pub fn get_release_delay(slot: usize) -> u32 {
    slot as u32 * RELEASE_DELAY_STEP
}
