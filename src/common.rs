mod agent;
mod constraint;
mod highlevel;
mod lowlevel;

pub use agent::{Agent, Fleet, Progress};
pub use constraint::{Constraint, ConstraintSet};
pub use highlevel::{find_first_conflict, paths_conflict, Conflict, ConflictKind};
pub(crate) use lowlevel::{LowLevelNode, OpenEntry};

use crate::map::Map;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid coordinate. Ordered by `x` first, then `y`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    pub fn manhattan(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(usize, usize)> for Position {
    fn from((x, y): (usize, usize)) -> Self {
        Position { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.x, self.y)
    }
}

/// Directed traversal between two cells in one timestep.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Edge {
    pub from: Position,
    pub to: Position,
}

impl Edge {
    pub const fn new(from: Position, to: Position) -> Self {
        Edge { from, to }
    }

    pub fn reversed(&self) -> Self {
        Edge {
            from: self.to,
            to: self.from,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Positions indexed by timestep; index 0 is the position at the start of the
/// planning iteration.
pub type Path = Vec<Position>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub paths: Vec<Path>,
}

impl Solution {
    pub fn cost(&self) -> usize {
        self.paths.iter().map(Vec::len).sum()
    }

    /// Checks that every path only uses passable cells, moves at most one cell
    /// per timestep and that no conflict exists inside `window`.
    pub fn verify(&self, map: &Map, window: Option<usize>) -> bool {
        for path in &self.paths {
            if !path.iter().all(|position| map.is_passable(*position)) {
                return false;
            }
            if path.windows(2).any(|step| step[0].manhattan(&step[1]) > 1) {
                return false;
            }
        }
        find_first_conflict(&self.paths, window).is_none()
    }
}
