use crate::constants::get_mode_duration;
use crate::types::{GameMode, PursuerView};

/// Global scatter/chase clock. Starts in scatter; frozen while the player is powered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeController {
    mode: GameMode,
    elapsed: u32,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            mode: GameMode::Scatter,
            elapsed: 0,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Advances the clock by one tick. On a toggle every roaming pursuer
    /// (not housed, not eyes, not frightened) turns around, and the new mode
    /// is returned.
    pub fn update(&mut self, powered: bool, pursuers: &mut [PursuerView]) -> Option<GameMode> {
        if powered {
            return None;
        }
        self.elapsed += 1;
        if self.elapsed < get_mode_duration(self.mode) {
            return None;
        }

        self.mode = self.mode.toggled();
        self.elapsed = 0;
        for pursuer in pursuers.iter_mut() {
            if !pursuer.housed && !pursuer.is_eyes() && !pursuer.is_frightened() {
                pursuer.dir = pursuer.dir.opposite();
            }
        }
        Some(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{CHASE_MODE_TICKS, SCATTER_MODE_TICKS};
    use crate::types::{DisplayState, Direction, GhostIdentity};

    use super::*;

    fn pursuer(identity: GhostIdentity, dir: Direction) -> PursuerView {
        PursuerView {
            identity,
            display_state: DisplayState::Normal,
            x: 0,
            y: 0,
            dir,
            target: None,
            housed: false,
            respawn_countdown: 0,
            release_delay: 0,
            just_released: false,
        }
    }

    #[test]
    fn toggles_after_scatter_then_chase_duration() {
        let mut controller = ModeController::new();
        let mut none: [PursuerView; 0] = [];
        for _ in 1..SCATTER_MODE_TICKS {
            assert_eq!(controller.update(false, &mut none), None);
        }
        assert_eq!(controller.update(false, &mut none), Some(GameMode::Chase));
        assert_eq!(controller.elapsed(), 0);
        for _ in 1..CHASE_MODE_TICKS {
            assert_eq!(controller.update(false, &mut none), None);
        }
        assert_eq!(controller.update(false, &mut none), Some(GameMode::Scatter));
    }

    #[test]
    fn clock_is_frozen_while_powered() {
        let mut controller = ModeController::new();
        let mut none: [PursuerView; 0] = [];
        for _ in 0..SCATTER_MODE_TICKS * 3 {
            assert_eq!(controller.update(true, &mut none), None);
        }
        assert_eq!(controller.elapsed(), 0);
        assert_eq!(controller.mode(), GameMode::Scatter);
    }

    #[test]
    fn toggle_reverses_only_roaming_pursuers() {
        let mut controller = ModeController::new();
        let mut pursuers = [
            pursuer(GhostIdentity::Blinky, Direction::Left),
            pursuer(GhostIdentity::Pinky, Direction::Up),
            pursuer(GhostIdentity::Inky, Direction::Down),
            pursuer(GhostIdentity::Clyde, Direction::Right),
        ];
        pursuers[1].housed = true;
        pursuers[2].display_state = DisplayState::Eyes;
        pursuers[3].display_state = DisplayState::Frightened;

        for _ in 1..SCATTER_MODE_TICKS {
            controller.update(false, &mut pursuers);
        }
        assert_eq!(pursuers[0].dir, Direction::Left);
        assert_eq!(controller.update(false, &mut pursuers), Some(GameMode::Chase));

        assert_eq!(pursuers[0].dir, Direction::Right);
        assert_eq!(pursuers[1].dir, Direction::Up);
        assert_eq!(pursuers[2].dir, Direction::Down);
        assert_eq!(pursuers[3].dir, Direction::Right);
    }
}
