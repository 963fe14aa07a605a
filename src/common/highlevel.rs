use super::{Constraint, Edge, Path, Position};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConflictKind {
    Vertex(Position),
    /// Directed move of `agent_1`; `agent_2` moved along the reverse.
    Edge(Edge),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Conflict {
    pub agent_1: usize,
    pub agent_2: usize,
    pub time_step: usize,
    pub kind: ConflictKind,
}

impl Conflict {
    /// Constraint that keeps `agent` out of this conflict.
    pub fn constraint_for(&self, agent: usize) -> Constraint {
        match self.kind {
            ConflictKind::Vertex(position) => Constraint::Vertex {
                position,
                time_step: self.time_step,
            },
            ConflictKind::Edge(edge) => Constraint::Edge {
                edge: if agent == self.agent_1 {
                    edge
                } else {
                    edge.reversed()
                },
                time_step: self.time_step,
            },
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConflictKind::Vertex(position) => write!(
                f,
                "vertex conflict between {} and {} at {} on ts {}",
                self.agent_1, self.agent_2, position, self.time_step
            ),
            ConflictKind::Edge(edge) => write!(
                f,
                "edge conflict between {} and {} over {} on ts {}",
                self.agent_1, self.agent_2, edge, self.time_step
            ),
        }
    }
}

fn horizon(longest: usize, window: Option<usize>) -> usize {
    window.map_or(longest, |window| longest.min(window))
}

/// Returns the earliest conflict among `paths`, scanning agents in id order.
///
/// Timestep 0 is never checked: it is the configuration handed over from the
/// previous window. An agent whose path has ended is no longer an obstacle.
pub fn find_first_conflict(paths: &[Path], window: Option<usize>) -> Option<Conflict> {
    let longest = paths.iter().map(Vec::len).max().unwrap_or(0);
    let mut position_to_agent = BTreeMap::new();
    let mut edge_to_agent = BTreeMap::new();

    for time_step in 1..horizon(longest, window) {
        position_to_agent.clear();
        edge_to_agent.clear();

        for (agent, path) in paths.iter().enumerate() {
            if path.len() <= time_step {
                continue;
            }

            let position = path[time_step];
            if let Some(&first) = position_to_agent.get(&position) {
                trace!("vertex conflict for {first} and {agent} at {position} on ts {time_step}");
                return Some(Conflict {
                    agent_1: first,
                    agent_2: agent,
                    time_step,
                    kind: ConflictKind::Vertex(position),
                });
            }
            position_to_agent.insert(position, agent);

            let edge = Edge::new(path[time_step - 1], position);
            let reverse = edge.reversed();
            if let Some(&first) = edge_to_agent.get(&reverse) {
                trace!("edge conflict for {first} and {agent} over {reverse} on ts {time_step}");
                return Some(Conflict {
                    agent_1: first,
                    agent_2: agent,
                    time_step,
                    kind: ConflictKind::Edge(reverse),
                });
            }
            edge_to_agent.insert(edge, agent);
        }
    }

    None
}

/// Pairwise variant of [`find_first_conflict`].
pub fn paths_conflict(lhs: &[Position], rhs: &[Position], window: Option<usize>) -> bool {
    let shared = lhs.len().min(rhs.len());
    (1..horizon(lhs.len().max(rhs.len()), window).min(shared)).any(|time_step| {
        lhs[time_step] == rhs[time_step]
            || (lhs[time_step] == rhs[time_step - 1] && lhs[time_step - 1] == rhs[time_step])
    })
}
