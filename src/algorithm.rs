mod astar;
mod topsort;

pub use astar::{a_star_search, PriorityContext, DEFAULT_HORIZON};
pub use topsort::PriorityGraph;

use crate::common::{LowLevelNode, Path, Position};

fn heuristic(position: Position, goal: Option<&Position>) -> usize {
    goal.map_or(0, |goal| position.manhattan(goal))
}

/// Rebuilds the route ending at `current`. The route is padded with the start
/// position when the search had to begin later than timestep 0.
fn construct_path(nodes: &[LowLevelNode], mut current: usize) -> Path {
    let mut path = vec![nodes[current].position];
    while let Some(parent) = nodes[current].parent {
        path.push(nodes[parent].position);
        current = parent;
    }
    let root = &nodes[current];
    path.extend(std::iter::repeat(root.position).take(root.time_step));
    path.reverse();
    path
}
