use std::collections::VecDeque;

use crate::grid::Grid;
use crate::rng::RandomSource;
use crate::types::{Direction, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepSource {
    Path,
    /// No path to the target existed; a random passable neighbor was taken.
    RandomFallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub source: StepSource,
}

impl Step {
    fn path(to: Vec2, dir: Direction) -> Self {
        Self {
            x: to.x,
            y: to.y,
            dir,
            source: StepSource::Path,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Passable moves from `(x, y)` without the reversal of `dir`, unless that
/// reversal is the only move available there.
pub fn moves_without_reverse(grid: &Grid, x: i32, y: i32, dir: Direction) -> Vec<(Direction, Vec2)> {
    let moves = grid.passable_moves(x, y);
    if moves.len() == 1 {
        return moves;
    }
    moves
        .into_iter()
        .filter(|(candidate, _)| *candidate != dir.opposite())
        .collect()
}

/// First step of the shortest path from `from` to `to` that never reverses
/// direction at a node with another way out.
pub fn next_step<R: RandomSource>(
    grid: &Grid,
    from: Vec2,
    to: Vec2,
    current: Direction,
    rng: &mut R,
) -> Option<Step> {
    if from == to {
        return None;
    }

    let width = grid.width();
    let mut visited = vec![false; (grid.width() * grid.height()) as usize];
    if grid.in_bounds(from.x, from.y) {
        visited[(from.y * width + from.x) as usize] = true;
    }

    let mut queue: VecDeque<(Vec2, Direction, Option<(Vec2, Direction)>)> = VecDeque::new();
    queue.push_back((from, current, None));

    while let Some((pos, arrived, first)) = queue.pop_front() {
        for (dir, next) in moves_without_reverse(grid, pos.x, pos.y, arrived) {
            let idx = (next.y * width + next.x) as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            let first = first.unwrap_or((next, dir));
            if next == to {
                return Some(Step::path(first.0, first.1));
            }
            queue.push_back((next, dir, Some(first)));
        }
    }

    random_step(grid, from, rng)
}

/// Any passable neighbor of `from`, reversal allowed.
pub fn random_step<R: RandomSource>(grid: &Grid, from: Vec2, rng: &mut R) -> Option<Step> {
    let moves = grid.passable_moves(from.x, from.y);
    if moves.is_empty() {
        return None;
    }
    let (dir, to) = moves[rng.pick_index(moves.len())];
    Some(Step {
        x: to.x,
        y: to.y,
        dir,
        source: StepSource::RandomFallback,
    })
}

/// First step of an unconstrained shortest path. The whole component is
/// searched before the route is walked back from `to`; `None` when `to` is
/// unreachable or already reached.
pub fn shortest_step(grid: &Grid, from: Vec2, to: Vec2) -> Option<Step> {
    if from == to || !grid.in_bounds(from.x, from.y) || !grid.in_bounds(to.x, to.y) {
        return None;
    }

    let width = grid.width();
    let index = |p: Vec2| (p.y * width + p.x) as usize;
    let mut parent: Vec<Option<(Vec2, Direction)>> = vec![None; (width * grid.height()) as usize];
    let mut visited = vec![false; parent.len()];
    visited[index(from)] = true;

    let mut queue = VecDeque::new();
    queue.push_back(from);
    while let Some(pos) = queue.pop_front() {
        for (dir, next) in grid.passable_moves(pos.x, pos.y) {
            if visited[index(next)] {
                continue;
            }
            visited[index(next)] = true;
            parent[index(next)] = Some((pos, dir));
            queue.push_back(next);
        }
    }

    if !visited[index(to)] {
        return None;
    }
    let mut cursor = to;
    loop {
        let (prev, dir) = parent[index(cursor)]?;
        if prev == from {
            return Some(Step::path(cursor, dir));
        }
        cursor = prev;
    }
}

/// First step toward the closest cell accepted by `wanted`, reversal allowed.
pub fn step_toward_nearest<F>(grid: &Grid, from: Vec2, wanted: F) -> Option<(Step, i32)>
where
    F: Fn(i32, i32) -> bool,
{
    let width = grid.width();
    let mut visited = vec![false; (width * grid.height()) as usize];
    if grid.in_bounds(from.x, from.y) {
        visited[(from.y * width + from.x) as usize] = true;
    }

    let mut queue: VecDeque<(Vec2, i32, Option<(Vec2, Direction)>)> = VecDeque::new();
    queue.push_back((from, 0, None));
    while let Some((pos, dist, first)) = queue.pop_front() {
        for (dir, next) in grid.passable_moves(pos.x, pos.y) {
            let idx = (next.y * width + next.x) as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            let first = first.unwrap_or((next, dir));
            if wanted(next.x, next.y) {
                return Some((Step::path(first.0, first.1), dist + 1));
            }
            queue.push_back((next, dist + 1, Some(first)));
        }
    }
    None
}
