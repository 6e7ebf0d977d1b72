use super::utils::{ahead, chebyshev, direction_between, manhattan};
use super::*;
use crate::constants::{
    CLYDE_FLEE_DISTANCE, FRIGHTENED_RANDOM_MOVE_CHANCE, FRIGHTENED_SKIP_CHANCE,
    FRIGHTENED_TARGET_RADIUS, INKY_LOOKAHEAD, PINKY_LOOKAHEAD, PURSUER_RESPAWN_DURATION,
};

/// Home corner of each pursuer while scattering.
pub fn scatter_corner(identity: GhostIdentity, grid: &Grid) -> Vec2 {
    let (right, bottom) = (grid.width() - 3, grid.height() - 1);
    match identity {
        GhostIdentity::Blinky => grid.clamp(right, 0),
        GhostIdentity::Pinky => grid.clamp(0, 0),
        GhostIdentity::Inky => grid.clamp(right, bottom),
        GhostIdentity::Clyde => grid.clamp(0, bottom),
    }
}

/// Chase-mode target. `blinky` is Blinky's position at the time of the call,
/// only Inky reads it.
pub fn chase_target(
    identity: GhostIdentity,
    player: &PlayerView,
    blinky: Vec2,
    own: Vec2,
    grid: &Grid,
) -> Vec2 {
    let at = player.position();
    match identity {
        GhostIdentity::Blinky => at,
        GhostIdentity::Pinky => {
            let lead = ahead(at, player.dir, PINKY_LOOKAHEAD);
            grid.clamp(lead.x, lead.y)
        }
        GhostIdentity::Inky => {
            let pivot = ahead(at, player.dir, INKY_LOOKAHEAD);
            grid.clamp(2 * pivot.x - blinky.x, 2 * pivot.y - blinky.y)
        }
        GhostIdentity::Clyde => {
            if manhattan(own.x, own.y, at.x, at.y) > CLYDE_FLEE_DISTANCE {
                at
            } else {
                scatter_corner(GhostIdentity::Clyde, grid)
            }
        }
    }
}

/// Random floor cell within the wander radius that `from` can walk to.
/// Falls back to a clamped offset when `from` is off the floor.
fn frightened_destination<R: RandomSource>(from: Vec2, grid: &Grid, rng: &mut R) -> Vec2 {
    let radius = FRIGHTENED_TARGET_RADIUS;
    let mut nearby: Vec<(i32, i32)> = grid
        .reachable_from(from)
        .into_iter()
        .filter(|&(x, y)| chebyshev(from, Vec2::new(x, y)) <= radius)
        .collect();
    if nearby.is_empty() {
        let dx = rng.int(-radius, radius);
        let dy = rng.int(-radius, radius);
        return grid.clamp(from.x + dx, from.y + dy);
    }
    nearby.sort_unstable_by_key(|&(x, y)| (y, x));
    let (x, y) = nearby[rng.pick_index(nearby.len())];
    Vec2::new(x, y)
}

/// Puts a housed pursuer on the door row, heading out.
pub(super) fn begin_release(pursuer: &mut PursuerView, door: Vec2) {
    pursuer.just_released = true;
    pursuer.y = door.y;
    pursuer.dir = Direction::Up;
}

/// Whether `dir` closes the gap toward `(dx, dy)` on either axis.
fn heads_toward(dir: Direction, dx: i32, dy: i32) -> bool {
    let (mx, my) = dir.delta();
    (dx > 0 && mx > 0) || (dx < 0 && mx < 0) || (dy > 0 && my > 0) || (dy < 0 && my < 0)
}

impl<R: RandomSource> GameEngine<R> {
    /// Respawn and release countdowns. Runs every processed tick, even while
    /// the player is down.
    pub(super) fn update_pursuer_timers(&mut self) {
        let powered = self.player.is_powered();
        let door = self.house.door;
        for identity in GhostIdentity::HOUSE_ORDER {
            let pursuer = &mut self.pursuers[identity.index()];

            if pursuer.housed && pursuer.respawn_countdown > 0 {
                pursuer.respawn_countdown -= 1;
                if pursuer.respawn_countdown == 0 {
                    pursuer.display_state = if powered {
                        DisplayState::Frightened
                    } else {
                        DisplayState::Normal
                    };
                    pursuer.housed = false;
                    pursuer.just_released = false;
                    pursuer.target = None;
                    self.events.push(RuntimeEvent::PursuerRespawned { identity });
                }
            }

            if pursuer.release_delay > 0 {
                pursuer.release_delay -= 1;
                if pursuer.release_delay == 0 && pursuer.housed {
                    begin_release(pursuer, door);
                }
            }
        }
    }

    pub(super) fn update_pursuers(&mut self) {
        for identity in GhostIdentity::HOUSE_ORDER {
            let idx = identity.index();
            if self.pursuers[idx].housed {
                self.move_housed(idx);
            } else if self.pursuers[idx].is_eyes() {
                self.move_eyes(idx);
            } else if self.pursuers[idx].is_frightened() {
                self.move_frightened(idx);
            } else {
                self.move_active(idx);
            }
        }
    }

    /// Releasing pursuers walk to the door column and leave; the rest bob
    /// inside the house band.
    fn move_housed(&mut self, idx: usize) {
        let door = self.house.door;
        let (top, bottom) = (self.house.band_top, self.house.band_bottom);
        let pursuer = &mut self.pursuers[idx];

        if pursuer.just_released {
            if pursuer.x == door.x {
                pursuer.y = door.y;
                pursuer.dir = Direction::Up;
                pursuer.housed = false;
                pursuer.just_released = false;
                let identity = pursuer.identity;
                self.events.push(RuntimeEvent::PursuerReleased { identity });
            } else if pursuer.x < door.x {
                pursuer.x += 1;
                pursuer.dir = Direction::Right;
            } else {
                pursuer.x -= 1;
                pursuer.dir = Direction::Left;
            }
            return;
        }

        if pursuer.respawn_countdown > 0 {
            return;
        }

        let going_down = pursuer.dir == Direction::Down;
        if going_down {
            if pursuer.y < bottom {
                pursuer.y += 1;
            } else {
                pursuer.dir = Direction::Up;
                if pursuer.y > top {
                    pursuer.y -= 1;
                }
            }
        } else if pursuer.y > top {
            pursuer.dir = Direction::Up;
            pursuer.y -= 1;
        } else {
            pursuer.dir = Direction::Down;
            if pursuer.y < bottom {
                pursuer.y += 1;
            }
        }
    }

    /// Eyes take the most direct route home and are reset once next to it.
    fn move_eyes(&mut self, idx: usize) {
        let respawn = self.house.respawn;
        let at = self.pursuers[idx].position();
        self.pursuers[idx].target = Some(respawn);

        if chebyshev(at, respawn) <= 1 {
            let pursuer = &mut self.pursuers[idx];
            pursuer.x = respawn.x;
            pursuer.y = respawn.y;
            pursuer.housed = true;
            pursuer.just_released = false;
            pursuer.respawn_countdown = PURSUER_RESPAWN_DURATION;
            return;
        }

        let step = pathfinder::shortest_step(&self.grid, at, respawn).or_else(|| {
            // Home cell may be a wall; any floor next to it will do.
            pathfinder::step_toward_nearest(&self.grid, at, |x, y| {
                chebyshev(Vec2::new(x, y), respawn) <= 1
            })
            .map(|(step, _)| step)
        });
        match step {
            Some(step) => self.apply_pursuer_step(idx, step),
            None => self.fly_home(idx, respawn),
        }
    }

    /// No floor route exists: eyes drift over walls one cell at a time.
    fn fly_home(&mut self, idx: usize, home: Vec2) {
        let at = self.pursuers[idx].position();
        let next = if at.x != home.x {
            Vec2::new(at.x + (home.x - at.x).signum(), at.y)
        } else {
            Vec2::new(at.x, at.y + (home.y - at.y).signum())
        };
        let Some(dir) = direction_between(at, next) else {
            return;
        };
        self.apply_pursuer_step(
            idx,
            Step {
                x: next.x,
                y: next.y,
                dir,
                source: StepSource::RandomFallback,
            },
        );
    }

    fn move_frightened(&mut self, idx: usize) {
        let at = self.pursuers[idx].position();
        let target = match self.pursuers[idx].target {
            Some(target) if target != at => target,
            _ => {
                let fresh = frightened_destination(at, &self.grid, &mut self.rng);
                self.pursuers[idx].target = Some(fresh);
                fresh
            }
        };

        let moves = pathfinder::moves_without_reverse(&self.grid, at.x, at.y, self.pursuers[idx].dir);
        if moves.is_empty() {
            self.record_blocked(idx);
            return;
        }

        let (dx, dy) = (target.x - at.x, target.y - at.y);
        let candidates = if self.rng.bool(FRIGHTENED_RANDOM_MOVE_CHANCE) {
            moves
        } else {
            let toward: Vec<(Direction, Vec2)> = moves
                .iter()
                .copied()
                .filter(|(dir, _)| heads_toward(*dir, dx, dy))
                .collect();
            if toward.is_empty() {
                moves
            } else {
                toward
            }
        };
        let (dir, next) = candidates[self.rng.pick_index(candidates.len())];

        if self.player.is_powered() && self.rng.bool(FRIGHTENED_SKIP_CHANCE) {
            return;
        }
        let pursuer = &mut self.pursuers[idx];
        pursuer.x = next.x;
        pursuer.y = next.y;
        pursuer.dir = dir;
    }

    fn move_active(&mut self, idx: usize) {
        let pursuer = &self.pursuers[idx];
        let (identity, at, dir) = (pursuer.identity, pursuer.position(), pursuer.dir);
        let target = match self.mode.mode() {
            GameMode::Scatter => scatter_corner(identity, &self.grid),
            GameMode::Chase => {
                let blinky = self.pursuers[GhostIdentity::Blinky.index()].position();
                chase_target(identity, &self.player, blinky, at, &self.grid)
            }
        };
        self.pursuers[idx].target = Some(target);

        match pathfinder::next_step(&self.grid, at, target, dir, &mut self.rng) {
            Some(step) => self.apply_pursuer_step(idx, step),
            None if at != target => self.record_blocked(idx),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use crate::engine::{EngineOptions, GameEngine};
    use crate::grid::Grid;
    use crate::rng::Rng;
    use crate::types::{
        DisplayState, Direction, GhostIdentity, PlayerState, PlayerView, RuntimeEvent, Vec2,
    };

    use super::{chase_target, frightened_destination, heads_toward, scatter_corner};

    fn open(width: usize, height: usize) -> Grid {
        Grid::without_pellets(&vec![vec![1u32; width]; height]).expect("grid")
    }

    fn player_at(x: i32, y: i32, dir: Direction) -> PlayerView {
        PlayerView {
            x,
            y,
            dir,
            state: PlayerState::Normal,
            points: 0,
            total_points: 0,
            dead_countdown: 0,
            powerup_countdown: 0,
            recent_positions: VecDeque::new(),
        }
    }

    fn engine_on(width: usize, height: usize) -> GameEngine {
        let mut grid = open(width, height);
        grid.set_pellet(width as i32 - 1, height as i32 - 1, true);
        GameEngine::new(grid, EngineOptions::default(), Rng::new(21)).expect("engine")
    }

    #[test]
    fn scatter_corners_are_distinct_and_clamped() {
        let grid = open(53, 7);
        assert_eq!(scatter_corner(GhostIdentity::Blinky, &grid), Vec2::new(50, 0));
        assert_eq!(scatter_corner(GhostIdentity::Pinky, &grid), Vec2::new(0, 0));
        assert_eq!(scatter_corner(GhostIdentity::Inky, &grid), Vec2::new(50, 6));
        assert_eq!(scatter_corner(GhostIdentity::Clyde, &grid), Vec2::new(0, 6));

        let tiny = open(2, 1);
        assert_eq!(scatter_corner(GhostIdentity::Blinky, &tiny), Vec2::new(0, 0));
    }

    #[test]
    fn blinky_targets_player_cell() {
        let grid = open(20, 10);
        let player = player_at(5, 5, Direction::Up);
        let target = chase_target(GhostIdentity::Blinky, &player, Vec2::new(0, 0), Vec2::new(0, 0), &grid);
        assert_eq!(target, Vec2::new(5, 5));
    }

    #[test]
    fn pinky_leads_four_cells_and_clamps() {
        let grid = open(20, 10);
        let player = player_at(5, 5, Direction::Right);
        let target = chase_target(GhostIdentity::Pinky, &player, Vec2::default(), Vec2::default(), &grid);
        assert_eq!(target, Vec2::new(9, 5));

        let player = player_at(5, 2, Direction::Up);
        let target = chase_target(GhostIdentity::Pinky, &player, Vec2::default(), Vec2::default(), &grid);
        assert_eq!(target, Vec2::new(5, 0));
    }

    #[test]
    fn inky_doubles_vector_from_blinky() {
        let grid = open(30, 20);
        let player = player_at(10, 10, Direction::Right);
        // pivot (12,10); blinky (8,6) -> (16,14)
        let target = chase_target(GhostIdentity::Inky, &player, Vec2::new(8, 6), Vec2::default(), &grid);
        assert_eq!(target, Vec2::new(16, 14));

        let far = chase_target(GhostIdentity::Inky, &player, Vec2::new(29, 0), Vec2::default(), &grid);
        assert_eq!(far, Vec2::new(0, 19));
    }

    #[test]
    fn clyde_flees_to_corner_when_close() {
        let grid = open(30, 12);
        let player = player_at(10, 5, Direction::Left);
        let near = chase_target(GhostIdentity::Clyde, &player, Vec2::default(), Vec2::new(14, 5), &grid);
        assert_eq!(near, Vec2::new(0, 11));
        let far = chase_target(GhostIdentity::Clyde, &player, Vec2::default(), Vec2::new(25, 5), &grid);
        assert_eq!(far, Vec2::new(10, 5));
    }

    #[test]
    fn heads_toward_checks_either_axis() {
        assert!(heads_toward(Direction::Right, 3, -2));
        assert!(heads_toward(Direction::Up, 3, -2));
        assert!(!heads_toward(Direction::Left, 3, -2));
        assert!(!heads_toward(Direction::Down, 3, 0));
    }

    #[test]
    fn housed_pursuer_stays_in_band_until_released() {
        let mut engine = engine_on(21, 9);
        let house = *engine.house();
        let pinky = GhostIdentity::Pinky.index();
        for _ in 0..19 {
            engine.update_pursuer_timers();
            engine.update_pursuers();
            let view = &engine.pursuers[pinky];
            assert!(view.housed);
            assert!((house.band_top..=house.band_bottom).contains(&view.y));
        }
    }

    #[test]
    fn released_pursuer_walks_to_door_and_leaves() {
        let mut engine = engine_on(21, 9);
        let door = engine.house().door;
        let inky = GhostIdentity::Inky.index();
        let mut released = false;
        for _ in 0..14 {
            engine.update_pursuer_timers();
            engine.update_pursuers();
            if engine
                .drain_events()
                .contains(&RuntimeEvent::PursuerReleased { identity: GhostIdentity::Inky })
            {
                released = true;
                assert_eq!(engine.pursuers[inky].position(), door);
                break;
            }
        }
        assert!(released);
        assert!(!engine.pursuers[inky].housed);
    }

    #[test]
    fn eyes_return_home_and_respawn() {
        let mut engine = engine_on(21, 9);
        let home = engine.house().respawn;
        let blinky = GhostIdentity::Blinky.index();
        engine.pursuers[blinky].display_state = DisplayState::Eyes;
        engine.pursuers[blinky].x = 18;
        engine.pursuers[blinky].y = 8;

        let mut respawned = false;
        for _ in 0..30 {
            engine.update_pursuer_timers();
            if engine
                .drain_events()
                .contains(&RuntimeEvent::PursuerRespawned { identity: GhostIdentity::Blinky })
            {
                respawned = true;
                break;
            }
            engine.update_pursuers();
        }
        assert!(respawned);
        let view = &engine.pursuers[blinky];
        assert_eq!(view.position(), home);
        assert_eq!(view.display_state, DisplayState::Normal);
        assert!(!view.housed);
        assert_eq!(view.identity, GhostIdentity::Blinky);
    }

    #[test]
    fn eyes_fly_over_walls_when_home_is_cut_off() {
        let mut counts = vec![vec![0u32; 11]; 7];
        counts[6] = vec![1; 11];
        let mut grid = Grid::without_pellets(&counts).expect("grid");
        grid.set_pellet(10, 6, true);
        let mut engine =
            GameEngine::new(grid, EngineOptions::default(), Rng::new(4)).expect("engine");
        let blinky = GhostIdentity::Blinky.index();
        engine.pursuers[blinky].display_state = DisplayState::Eyes;
        engine.pursuers[blinky].x = 5;
        engine.pursuers[blinky].y = 6;

        engine.update_pursuers();
        assert_eq!(engine.pursuers[blinky].position(), Vec2::new(5, 5));
        assert_eq!(engine.pursuers[blinky].dir, Direction::Up);
    }

    #[test]
    fn respawn_while_powered_comes_back_frightened() {
        let mut engine = engine_on(21, 9);
        let clyde = GhostIdentity::Clyde.index();
        engine.player.powerup_countdown = 10;
        engine.pursuers[clyde].display_state = DisplayState::Eyes;
        engine.pursuers[clyde].housed = true;
        engine.pursuers[clyde].respawn_countdown = 1;

        engine.update_pursuer_timers();
        assert_eq!(engine.pursuers[clyde].display_state, DisplayState::Frightened);
        assert!(!engine.pursuers[clyde].housed);
    }

    #[test]
    fn frightened_pursuer_moves_at_most_one_cell() {
        let mut engine = engine_on(21, 9);
        engine.player.powerup_countdown = 20;
        let blinky = GhostIdentity::Blinky.index();
        engine.pursuers[blinky].display_state = DisplayState::Frightened;
        let mut moved = 0;
        for _ in 0..200 {
            let before = engine.pursuers[blinky].position();
            engine.update_pursuers();
            let after = engine.pursuers[blinky].position();
            let dist = (after.x - before.x).abs() + (after.y - before.y).abs();
            assert!(dist <= 1);
            moved += dist;
        }
        // 60% of moves are skipped while the player is powered
        assert!(moved > 20 && moved < 150, "moved={moved}");
    }

    #[test]
    fn active_pursuer_closes_in_on_scatter_corner() {
        let mut engine = engine_on(21, 9);
        let blinky = GhostIdentity::Blinky.index();
        let corner = scatter_corner(GhostIdentity::Blinky, engine.grid());
        for _ in 0..40 {
            engine.update_pursuers();
        }
        let at = engine.pursuers[blinky].position();
        assert!((at.x - corner.x).abs() + (at.y - corner.y).abs() <= 2);
        assert_eq!(engine.pursuers[blinky].target, Some(corner));
    }

    #[test]
    fn frightened_destination_is_reachable_floor_within_radius() {
        // Left room is walled off from the right one by column 4.
        let mut counts = vec![vec![1u32; 12]; 5];
        for row in counts.iter_mut() {
            row[4] = 0;
        }
        counts[0][1] = 0;
        counts[2][2] = 0;
        let grid = Grid::without_pellets(&counts).expect("grid");
        let reachable = grid.reachable_from(Vec2::new(0, 0));
        let mut rng = Rng::new(5);
        for _ in 0..300 {
            let target = frightened_destination(Vec2::new(0, 0), &grid, &mut rng);
            assert!(grid.is_passable(target.x, target.y), "{target:?}");
            assert!(reachable.contains(&(target.x, target.y)), "{target:?}");
            assert!(target.x < 4);
        }
    }
}
