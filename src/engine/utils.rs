use crate::types::{Direction, Vec2};

pub(super) fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> i32 {
    (ax - bx).abs() + (ay - by).abs()
}

pub(super) fn chebyshev(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

pub(super) fn offset(x: i32, y: i32, dir: Direction) -> (i32, i32) {
    match dir {
        Direction::Up => (x, y - 1),
        Direction::Down => (x, y + 1),
        Direction::Left => (x - 1, y),
        Direction::Right => (x + 1, y),
    }
}

/// `steps` cells ahead of `origin` along `dir`, unclamped.
pub(super) fn ahead(origin: Vec2, dir: Direction, steps: i32) -> Vec2 {
    let (dx, dy) = dir.delta();
    Vec2::new(origin.x + dx * steps, origin.y + dy * steps)
}

/// Direction that leads from `from` to the orthogonally adjacent `to`.
pub(super) fn direction_between(from: Vec2, to: Vec2) -> Option<Direction> {
    Direction::SEARCH_ORDER
        .into_iter()
        .find(|dir| offset(from.x, from.y, *dir) == (to.x, to.y))
}
