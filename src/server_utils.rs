use rand::Rng;

use crate::constants::TICK_MS;

pub const MAX_GAME_SPEED: u32 = 8;
pub const MIN_TICK_MS: u64 = 16;
pub const MAX_TICK_MS: u64 = 2_000;

pub fn normalize_game_speed(value: Option<i64>) -> u32 {
    value.unwrap_or(1).clamp(1, i64::from(MAX_GAME_SPEED)) as u32
}

pub fn normalize_tick_ms(value: Option<i64>) -> u64 {
    match value {
        None => TICK_MS,
        Some(ms) => ms.clamp(MIN_TICK_MS as i64, MAX_TICK_MS as i64) as u64,
    }
}

/// Seeds outside the 32-bit range wrap instead of being rejected.
pub fn normalize_seed(value: Option<i64>) -> u32 {
    match value {
        Some(seed) => seed as u32,
        None => make_seed(),
    }
}

pub fn make_seed() -> u32 {
    rand::rng().random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_speed_is_clamped() {
        assert_eq!(normalize_game_speed(None), 1);
        assert_eq!(normalize_game_speed(Some(0)), 1);
        assert_eq!(normalize_game_speed(Some(-4)), 1);
        assert_eq!(normalize_game_speed(Some(3)), 3);
        assert_eq!(normalize_game_speed(Some(100)), MAX_GAME_SPEED);
    }

    #[test]
    fn tick_ms_defaults_and_clamps() {
        assert_eq!(normalize_tick_ms(None), 200);
        assert_eq!(normalize_tick_ms(Some(1)), MIN_TICK_MS);
        assert_eq!(normalize_tick_ms(Some(120)), 120);
        assert_eq!(normalize_tick_ms(Some(i64::MAX)), MAX_TICK_MS);
    }

    #[test]
    fn explicit_seed_is_kept() {
        assert_eq!(normalize_seed(Some(42)), 42);
        assert_eq!(normalize_seed(Some(1 << 32)), 0);
        assert_eq!(normalize_seed(Some(-1)), u32::MAX);
    }
}
