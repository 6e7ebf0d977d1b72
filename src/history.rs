use std::sync::Arc;

use serde::Serialize;

use crate::grid::PelletLayer;
use crate::types::{GameMode, PlayerView, PursuerView};

/// State of the run after one tick. Pellet occupancy is shared with earlier
/// frames until a pellet is eaten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub mode: GameMode,
    pub player: PlayerView,
    /// Indexed by `GhostIdentity::index()`.
    pub pursuers: [PursuerView; 4],
    pub pellets: Arc<PelletLayer>,
}

/// Append-only log of frames, one per tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SnapshotHistory {
    frames: Vec<Frame>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a SnapshotHistory {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
