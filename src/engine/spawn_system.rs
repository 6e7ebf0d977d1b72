use super::pursuer_system::begin_release;
use super::*;
use crate::constants::{get_release_delay, DEFAULT_PLAYER_START, HOUSE_BOTTOM_Y, HOUSE_DOOR_Y, HOUSE_TOP_Y};

/// Facing of each house slot in the fixed formation.
const FIXED_FACING: [Direction; 4] = [
    Direction::Left,
    Direction::Up,
    Direction::Down,
    Direction::Up,
];

/// Pursuer house around column `width / 2`, clamped to the grid. The house is
/// drawn over whatever cells happen to be there; housed pursuers ignore walls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HouseLayout {
    pub door: Vec2,
    /// Where returning eyes are reset.
    pub respawn: Vec2,
    pub band_top: i32,
    pub band_bottom: i32,
    /// Start cells in `GhostIdentity::HOUSE_ORDER`.
    pub slots: [Vec2; 4],
}

impl HouseLayout {
    pub fn for_grid(grid: &Grid) -> Self {
        let center_x = grid.width() / 2;
        let center = grid.clamp(center_x, HOUSE_TOP_Y);
        Self {
            door: grid.clamp(center_x, HOUSE_DOOR_Y),
            respawn: center,
            band_top: center.y,
            band_bottom: grid.clamp(center_x, HOUSE_BOTTOM_Y).y,
            slots: [
                center,
                grid.clamp(center_x - 1, HOUSE_TOP_Y),
                grid.clamp(center_x + 1, HOUSE_TOP_Y),
                grid.clamp(center_x, HOUSE_DOOR_Y),
            ],
        }
    }

    /// Slots and the door column. The player never starts on one of these
    /// unless the grid has no other floor.
    pub fn covers(&self, at: Vec2) -> bool {
        at.x == self.door.x || self.slots.contains(&at)
    }

    /// Fixed formation, or with custom starts only the passable slots are
    /// used in order and missing ones fall back to the house center.
    pub fn formation(&self, grid: &Grid, custom: bool) -> [PursuerView; 4] {
        let open_slots: Vec<Vec2> = self
            .slots
            .iter()
            .copied()
            .filter(|slot| grid.is_passable(slot.x, slot.y))
            .collect();

        GhostIdentity::ALL.map(|identity| {
            let slot = identity.house_slot();
            let (at, dir) = if custom {
                (
                    open_slots.get(slot).copied().unwrap_or(self.respawn),
                    Direction::Left,
                )
            } else {
                (self.slots[slot], FIXED_FACING[slot])
            };
            PursuerView {
                identity,
                display_state: DisplayState::Normal,
                x: at.x,
                y: at.y,
                dir,
                target: None,
                housed: slot != 0,
                respawn_countdown: 0,
                release_delay: get_release_delay(slot),
                just_released: false,
            }
        })
    }
}

pub(super) fn pick_player_start<R: RandomSource>(
    grid: &Grid,
    house: &HouseLayout,
    custom: bool,
    rng: &mut R,
) -> SimResult<Vec2> {
    if custom {
        let all = grid.passable_cells();
        let outside: Vec<Vec2> = all.iter().copied().filter(|cell| !house.covers(*cell)).collect();
        let cells = if outside.is_empty() { all } else { outside };
        if cells.is_empty() {
            return Err(SimError::EmptyGrid);
        }
        return Ok(cells[rng.pick_index(cells.len())]);
    }
    let (x, y) = DEFAULT_PLAYER_START;
    let target = Vec2::new(x, y);
    grid.nearest_passable_where(target, |cell| !house.covers(cell))
        .or_else(|| grid.nearest_passable(target))
        .ok_or(SimError::EmptyGrid)
}

pub(super) fn fresh_player(start: Vec2) -> PlayerView {
    PlayerView {
        x: start.x,
        y: start.y,
        dir: Direction::Right,
        state: PlayerState::Normal,
        points: 0,
        total_points: 0,
        dead_countdown: 0,
        powerup_countdown: 0,
        recent_positions: VecDeque::new(),
    }
}

impl<R: RandomSource> GameEngine<R> {
    /// Puts the player back on its start cell. Scores survive; the start
    /// cell's pellet is eaten on the spot.
    pub(super) fn place_player(&mut self) {
        let start = self.player_start;
        self.player.x = start.x;
        self.player.y = start.y;
        self.player.dir = Direction::Right;
        self.player.recent_positions.clear();
        self.sync_player_state();
        self.eat_pellet_at(start.x, start.y);
    }

    /// Puts the pursuers back in formation. Release countdowns keep running
    /// from where they were, and pursuers already let out leave again at once.
    pub(super) fn place_pursuers(&mut self) {
        let formation = self
            .house
            .formation(&self.grid, self.options.use_custom_start_positions);
        let previous = std::mem::replace(&mut self.pursuers, formation);
        let door = self.house.door;
        for (pursuer, before) in self.pursuers.iter_mut().zip(previous.iter()) {
            pursuer.release_delay = pursuer.release_delay.min(before.release_delay);
            if pursuer.housed && pursuer.release_delay == 0 {
                begin_release(pursuer, door);
            }
        }
    }
}
