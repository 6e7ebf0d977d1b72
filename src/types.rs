use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Neighbor exploration order shared by every search: right, left, down, up.
    pub const SEARCH_ORDER: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Scatter,
    Chase,
}

impl GameMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Scatter => Self::Chase,
            Self::Chase => Self::Scatter,
        }
    }
}

/// Permanent identity of a pursuer. A = Blinky, B = Pinky, C = Inky, D = Clyde.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostIdentity {
    Blinky,
    Pinky,
    Inky,
    Clyde,
}

impl GhostIdentity {
    pub const ALL: [GhostIdentity; 4] = [
        GhostIdentity::Blinky,
        GhostIdentity::Pinky,
        GhostIdentity::Inky,
        GhostIdentity::Clyde,
    ];

    /// House formation order; slot 0 starts outside, the rest wait for release.
    pub const HOUSE_ORDER: [GhostIdentity; 4] = [
        GhostIdentity::Blinky,
        GhostIdentity::Inky,
        GhostIdentity::Pinky,
        GhostIdentity::Clyde,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Blinky => 0,
            Self::Pinky => 1,
            Self::Inky => 2,
            Self::Clyde => 3,
        }
    }

    /// Position in `HOUSE_ORDER`.
    pub fn house_slot(self) -> usize {
        match self {
            Self::Blinky => 0,
            Self::Inky => 1,
            Self::Pinky => 2,
            Self::Clyde => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Blinky => "blinky",
            Self::Pinky => "pinky",
            Self::Inky => "inky",
            Self::Clyde => "clyde",
        }
    }
}

/// What a renderer should draw for a pursuer. `Eyes` overrides the identity
/// while the pursuer returns to the house and is ignored by collisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Normal,
    Frightened,
    Eyes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Normal,
    Power,
    Dead,
}

/// Quartile of a cell's activity count among all positive counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    None,
    First,
    Second,
    Third,
    Fourth,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub state: PlayerState,
    pub points: u32,
    #[serde(rename = "totalPoints")]
    pub total_points: u32,
    #[serde(rename = "deadCountdown")]
    pub dead_countdown: u32,
    #[serde(rename = "powerupCountdown")]
    pub powerup_countdown: u32,
    #[serde(rename = "recentPositions")]
    pub recent_positions: VecDeque<Vec2>,
}

impl PlayerView {
    pub fn is_dead(&self) -> bool {
        self.dead_countdown > 0
    }

    pub fn is_powered(&self) -> bool {
        self.powerup_countdown > 0
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PursuerView {
    pub identity: GhostIdentity,
    #[serde(rename = "displayState")]
    pub display_state: DisplayState,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub target: Option<Vec2>,
    pub housed: bool,
    #[serde(rename = "respawnCountdown")]
    pub respawn_countdown: u32,
    #[serde(rename = "releaseDelay")]
    pub release_delay: u32,
    #[serde(rename = "justReleased")]
    pub just_released: bool,
}

impl PursuerView {
    pub fn is_eyes(&self) -> bool {
        self.display_state == DisplayState::Eyes
    }

    pub fn is_frightened(&self) -> bool {
        self.display_state == DisplayState::Frightened
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Cleared,
    TickLimit,
    /// Interactive run cancelled before it finished. Never reported by the engine itself.
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    PelletEaten {
        x: i32,
        y: i32,
    },
    PowerUpStarted {
        x: i32,
        y: i32,
    },
    PowerUpEnded,
    PursuerEaten {
        identity: GhostIdentity,
    },
    PursuerRespawned {
        identity: GhostIdentity,
    },
    PursuerReleased {
        identity: GhostIdentity,
    },
    PlayerDown {
        by: GhostIdentity,
    },
    PlayerRevived,
    ModeChanged {
        mode: GameMode,
    },
    PathFallback {
        identity: GhostIdentity,
        x: i32,
        y: i32,
    },
    PathBlocked {
        identity: GhostIdentity,
        x: i32,
        y: i32,
    },
    RunFinished {
        reason: GameOverReason,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub reason: GameOverReason,
    pub ticks: u64,
    pub frames: usize,
    #[serde(rename = "totalPoints")]
    pub total_points: u32,
    #[serde(rename = "pelletsEaten")]
    pub pellets_eaten: u32,
    #[serde(rename = "pursuersEaten")]
    pub pursuers_eaten: u32,
    pub deaths: u32,
    #[serde(rename = "powerUps")]
    pub power_ups: u32,
    #[serde(rename = "pathFallbacks")]
    pub path_fallbacks: u32,
}
