use super::utils::offset;
use super::*;
use crate::constants::{POWERUP_DURATION, RECENT_POSITIONS_LIMIT};

const PELLET_SCORE: f32 = 12.0;
const TRAIL_SCORE: f32 = 4.0;
const REVISIT_PENALTY: f32 = 0.45;
const JITTER: f32 = 0.4;

impl<R: RandomSource> GameEngine<R> {
    pub(super) fn move_player(&mut self) {
        let (x, y) = (self.player.x, self.player.y);
        let Some(dir) = self.choose_pellet_direction(x, y) else {
            return;
        };
        let (nx, ny) = offset(x, y, dir);
        self.player.x = nx;
        self.player.y = ny;
        self.player.dir = dir;

        self.player.recent_positions.push_back(Vec2::new(nx, ny));
        while self.player.recent_positions.len() > RECENT_POSITIONS_LIMIT {
            self.player.recent_positions.pop_front();
        }

        self.eat_pellet_at(nx, ny);
        self.try_power_up(nx, ny);
    }

    /// Scores every open neighbor: a pellet on it, lying on the shortest
    /// route to the nearest pellet, minus recent visits, plus jitter.
    pub(super) fn choose_pellet_direction(&mut self, x: i32, y: i32) -> Option<Direction> {
        let trail = pathfinder::step_toward_nearest(&self.grid, Vec2::new(x, y), |px, py| {
            self.grid.has_pellet(px, py)
        })
        .map(|(step, _)| step.dir);

        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for (dir, next) in self.grid.passable_moves(x, y) {
            let mut score = 0.0;
            if self.grid.has_pellet(next.x, next.y) {
                score += PELLET_SCORE;
            }
            if trail == Some(dir) {
                score += TRAIL_SCORE;
            }
            let visits = self
                .player
                .recent_positions
                .iter()
                .filter(|seen| **seen == next)
                .count();
            score -= visits as f32 * REVISIT_PENALTY;
            score += self.rng.next_f32() * JITTER;

            if score > best_score {
                best_score = score;
                best = Some(dir);
            }
        }
        best
    }

    /// Entering a busiest-quartile cell with its charge unspent powers the
    /// player up and frightens every pursuer that is not eyes.
    fn try_power_up(&mut self, x: i32, y: i32) {
        if self.player.is_powered() || !self.grid.take_power_charge(x, y) {
            return;
        }
        self.player.powerup_countdown = POWERUP_DURATION;
        self.sync_player_state();
        for pursuer in self.pursuers.iter_mut() {
            if !pursuer.is_eyes() {
                pursuer.display_state = DisplayState::Frightened;
                pursuer.target = None;
            }
        }
        self.stats.power_ups += 1;
        self.events.push(RuntimeEvent::PowerUpStarted { x, y });
    }
}
