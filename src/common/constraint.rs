use super::{Edge, Position};

use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Ord, PartialOrd)]
pub enum Constraint {
    Vertex { position: Position, time_step: usize },
    Edge { edge: Edge, time_step: usize },
}

/// Forbidden cells and directed edges of one agent, keyed by timestep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    vertices: HashMap<usize, BTreeSet<Position>>,
    edges: HashMap<usize, BTreeSet<Edge>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the constraint was already present.
    pub fn insert(&mut self, constraint: Constraint) -> bool {
        match constraint {
            Constraint::Vertex {
                position,
                time_step,
            } => self.vertices.entry(time_step).or_default().insert(position),
            Constraint::Edge { edge, time_step } => {
                self.edges.entry(time_step).or_default().insert(edge)
            }
        }
    }

    pub fn is_vertex_forbidden(&self, position: Position, time_step: usize) -> bool {
        self.vertices
            .get(&time_step)
            .is_some_and(|positions| positions.contains(&position))
    }

    pub fn is_edge_forbidden(&self, edge: &Edge, time_step: usize) -> bool {
        self.edges
            .get(&time_step)
            .is_some_and(|edges| edges.contains(edge))
    }

    /// Whether moving `from -> to`, arriving at `time_step`, breaks any constraint.
    pub fn is_violated(&self, from: Position, to: Position, time_step: usize) -> bool {
        self.is_vertex_forbidden(to, time_step)
            || self.is_edge_forbidden(&Edge::new(from, to), time_step)
    }

    pub fn len(&self) -> usize {
        self.vertices.values().map(BTreeSet::len).sum::<usize>()
            + self.edges.values().map(BTreeSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<Constraint> for ConstraintSet {
    fn extend<I: IntoIterator<Item = Constraint>>(&mut self, iter: I) {
        for constraint in iter {
            self.insert(constraint);
        }
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        let mut set = ConstraintSet::new();
        set.extend(iter);
        set
    }
}
