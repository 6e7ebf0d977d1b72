use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::constants::PELLET_PROBABILITY;
use crate::error::{SimError, SimResult};
use crate::rng::RandomSource;
use crate::types::{Direction, Level, Vec2};

/// Read-only view of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub passable: bool,
    pub pellet_present: bool,
    pub level: Level,
}

#[derive(Clone, Debug)]
struct CellInfo {
    count: u32,
    level: Level,
    power_charge: bool,
}

/// Pellet occupancy of the whole grid. Frames share it through an `Arc` and the
/// engine copies it only when a pellet is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PelletLayer {
    pub width: i32,
    pub height: i32,
    pub remaining: usize,
    cells: Vec<bool>,
}

impl PelletLayer {
    fn empty(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            remaining: 0,
            cells: vec![false; (width * height) as usize],
        }
    }

    pub fn has(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        self.cells[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: i32, y: i32, present: bool) -> bool {
        let idx = (y * self.width + x) as usize;
        if self.cells[idx] == present {
            return false;
        }
        self.cells[idx] = present;
        if present {
            self.remaining += 1;
        } else {
            self.remaining -= 1;
        }
        true
    }
}

impl Serialize for PelletLayer {
    // Rows are strings with 'o' for a pellet and '.' otherwise.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<String> = self
            .cells
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|present| if *present { 'o' } else { '.' }).collect())
            .collect();
        let mut state = serializer.serialize_struct("PelletLayer", 4)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("remaining", &self.remaining)?;
        state.serialize_field("cells", &rows)?;
        state.end()
    }
}

#[derive(Clone, Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<CellInfo>,
    pellets: Arc<PelletLayer>,
}

impl Grid {
    /// Builds the playable grid and seeds pellets on passable cells.
    pub fn from_counts<R: RandomSource>(counts: &[Vec<u32>], rng: &mut R) -> SimResult<Self> {
        let mut grid = Self::without_pellets(counts)?;
        for y in 0..grid.height {
            for x in 0..grid.width {
                if grid.is_passable(x, y) && rng.bool(PELLET_PROBABILITY) {
                    grid.set_pellet(x, y, true);
                }
            }
        }
        Ok(grid)
    }

    pub fn without_pellets(counts: &[Vec<u32>]) -> SimResult<Self> {
        let (height, width) = validate_counts(counts)?;
        let thresholds = quartile_thresholds(counts);
        let mut cells = Vec::with_capacity(width * height);
        for row in counts {
            for &count in row {
                let level = classify(count, thresholds);
                cells.push(CellInfo {
                    count,
                    level,
                    power_charge: level == Level::Fourth,
                });
            }
        }
        if cells.iter().all(|cell| cell.count == 0) {
            return Err(SimError::EmptyGrid);
        }
        Ok(Self {
            width: width as i32,
            height: height as i32,
            cells,
            pellets: Arc::new(PelletLayer::empty(width as i32, height as i32)),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn clamp(&self, x: i32, y: i32) -> Vec2 {
        Vec2::new(x.clamp(0, self.width - 1), y.clamp(0, self.height - 1))
    }

    fn info(&self, x: i32, y: i32) -> Option<&CellInfo> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.cells.get((y * self.width + x) as usize)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        self.info(x, y).map(|info| Cell {
            passable: info.count > 0,
            pellet_present: self.pellets.has(x, y),
            level: info.level,
        })
    }

    pub fn is_passable(&self, x: i32, y: i32) -> bool {
        self.info(x, y).map(|info| info.count > 0).unwrap_or(false)
    }

    pub fn has_pellet(&self, x: i32, y: i32) -> bool {
        self.pellets.has(x, y)
    }

    pub fn level(&self, x: i32, y: i32) -> Level {
        self.info(x, y).map(|info| info.level).unwrap_or(Level::None)
    }

    pub fn pellets_remaining(&self) -> usize {
        self.pellets.remaining
    }

    pub fn pellet_layer(&self) -> Arc<PelletLayer> {
        Arc::clone(&self.pellets)
    }

    /// Places or removes a pellet. Only passable cells can hold one.
    pub fn set_pellet(&mut self, x: i32, y: i32, present: bool) -> bool {
        if !self.is_passable(x, y) || self.pellets.has(x, y) == present {
            return false;
        }
        Arc::make_mut(&mut self.pellets).set(x, y, present)
    }

    pub fn consume_pellet(&mut self, x: i32, y: i32) -> bool {
        self.set_pellet(x, y, false)
    }

    /// Spends the one-shot power charge of a top-quartile cell.
    pub fn take_power_charge(&mut self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = (y * self.width + x) as usize;
        let cell = &mut self.cells[idx];
        if cell.level != Level::Fourth || !cell.power_charge {
            return false;
        }
        cell.power_charge = false;
        true
    }

    /// Passable neighbors in search order (right, left, down, up).
    pub fn passable_moves(&self, x: i32, y: i32) -> Vec<(Direction, Vec2)> {
        Direction::SEARCH_ORDER
            .iter()
            .filter_map(|dir| {
                let (dx, dy) = dir.delta();
                let (nx, ny) = (x + dx, y + dy);
                self.is_passable(nx, ny).then_some((*dir, Vec2::new(nx, ny)))
            })
            .collect()
    }

    pub fn passable_cells(&self) -> Vec<Vec2> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_passable(x, y) {
                    out.push(Vec2::new(x, y));
                }
            }
        }
        out
    }

    /// Passable cell closest to `target` by Manhattan distance, ties broken by y then x.
    pub fn nearest_passable(&self, target: Vec2) -> Option<Vec2> {
        self.nearest_passable_where(target, |_| true)
    }

    /// Like `nearest_passable`, restricted to cells accepted by `keep`.
    pub fn nearest_passable_where(&self, target: Vec2, keep: impl Fn(Vec2) -> bool) -> Option<Vec2> {
        let mut best: Option<(i32, i32, i32, Vec2)> = None;
        for cell in self.passable_cells().into_iter().filter(|cell| keep(*cell)) {
            let dist = (cell.x - target.x).abs() + (cell.y - target.y).abs();
            let key = (dist, cell.y, cell.x, cell);
            if best
                .map(|v| (v.0, v.1, v.2) > (key.0, key.1, key.2))
                .unwrap_or(true)
            {
                best = Some(key);
            }
        }
        best.map(|(_, _, _, cell)| cell)
    }

    pub fn reachable_from(&self, start: Vec2) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        if !self.is_passable(start.x, start.y) {
            return out;
        }

        let mut queue = VecDeque::new();
        out.insert((start.x, start.y));
        queue.push_back((start.x, start.y));

        while let Some((x, y)) = queue.pop_front() {
            for (_, next) in self.passable_moves(x, y) {
                if out.insert((next.x, next.y)) {
                    queue.push_back((next.x, next.y));
                }
            }
        }

        out
    }

    /// Drops every pellet outside `keep`. Returns how many were removed.
    pub fn retain_pellets(&mut self, keep: &HashSet<(i32, i32)>) -> usize {
        let mut removed = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.has_pellet(x, y) && !keep.contains(&(x, y)) && self.consume_pellet(x, y) {
                    removed += 1;
                }
            }
        }
        removed
    }
}

/// Returns `(rows, cols)` of a rectangular, non-empty matrix.
pub fn validate_counts(counts: &[Vec<u32>]) -> SimResult<(usize, usize)> {
    let Some(first) = counts.first() else {
        return Err(SimError::EmptyGrid);
    };
    let expected = first.len();
    if expected == 0 {
        return Err(SimError::EmptyGrid);
    }
    for (row, values) in counts.iter().enumerate() {
        if values.len() != expected {
            return Err(SimError::RaggedGrid {
                row,
                expected,
                actual: values.len(),
            });
        }
    }
    Ok((counts.len(), expected))
}

fn quartile_thresholds(counts: &[Vec<u32>]) -> Option<(u32, u32, u32)> {
    let mut positive: Vec<u32> = counts
        .iter()
        .flat_map(|row| row.iter().copied())
        .filter(|count| *count > 0)
        .collect();
    if positive.is_empty() {
        return None;
    }
    positive.sort_unstable();
    let len = positive.len();
    Some((positive[len / 4], positive[len / 2], positive[(3 * len) / 4]))
}

fn classify(count: u32, thresholds: Option<(u32, u32, u32)>) -> Level {
    let Some((q1, q2, q3)) = thresholds else {
        return Level::None;
    };
    if count == 0 {
        Level::None
    } else if count >= q3 {
        Level::Fourth
    } else if count >= q2 {
        Level::Third
    } else if count >= q1 {
        Level::Second
    } else {
        Level::First
    }
}

pub fn parse_counts_json(raw: &str) -> SimResult<Vec<Vec<u32>>> {
    let counts: Vec<Vec<u32>> = serde_json::from_str(raw).map_err(|error| {
        SimError::UnsupportedConfiguration(format!("activity grid is not a number matrix: {error}"))
    })?;
    validate_counts(&counts)?;
    Ok(counts)
}

/// Synthesizes a contributions-calendar-like matrix: rows are weekdays, columns weeks.
pub fn demo_counts<R: RandomSource>(rows: usize, cols: usize, rng: &mut R) -> Vec<Vec<u32>> {
    let mut counts = vec![vec![0u32; cols]; rows];
    for (y, row) in counts.iter_mut().enumerate() {
        let weekend = y == 0 || y + 1 == rows;
        let active_rate = if weekend { 0.45 } else { 0.78 };
        for value in row.iter_mut() {
            if !rng.bool(active_rate) {
                continue;
            }
            let roll = rng.next_f32();
            *value = if roll < 0.55 {
                rng.int(1, 3) as u32
            } else if roll < 0.85 {
                rng.int(4, 8) as u32
            } else {
                rng.int(9, 20) as u32
            };
        }
    }
    counts
}
