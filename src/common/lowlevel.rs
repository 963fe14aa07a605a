use super::{Position, Progress};

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LowLevelNode {
    pub(crate) position: Position,
    pub(crate) progress: Progress,
    pub(crate) time_step: usize,
    pub(crate) parent: Option<usize>, // index into the search arena
}

/// Open list entry. `BinaryHeap` pops the greatest entry, so the ordering is
/// arranged for that: deeper progress first, then lower `f`, then FIFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenEntry {
    pub(crate) label: usize,
    pub(crate) f_cost: usize,
    pub(crate) seq: usize,
    pub(crate) node: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label
            .cmp(&other.label)
            .then_with(|| other.f_cost.cmp(&self.f_cost))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
