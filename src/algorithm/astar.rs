use super::{construct_path, heuristic};
use crate::common::{Agent, ConstraintSet, LowLevelNode, OpenEntry, Path, Position};
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, instrument, trace};

pub const DEFAULT_HORIZON: usize = 10_000;

/// Routes of agents that are already fixed and must be avoided.
#[derive(Debug, Clone, Copy)]
pub struct PriorityContext<'a> {
    pub paths: &'a [Path],
    /// Higher-priority agents, most important first.
    pub higher: &'a [usize],
    /// Collisions at or beyond this timestep are ignored.
    pub window: Option<usize>,
}

impl PriorityContext<'_> {
    fn blocks(&self, from: Position, to: Position, time_step: usize) -> bool {
        if self.window.is_some_and(|window| time_step >= window) {
            return false;
        }
        self.higher.iter().any(|&agent| {
            let path = &self.paths[agent];
            if time_step >= path.len() {
                return false;
            }
            path[time_step] == to
                || (time_step > 0 && path[time_step] == from && path[time_step - 1] == to)
        })
    }
}

/// Time-expanded search through all of `agent`'s waypoints in order.
///
/// Nodes with more visited waypoints are expanded first, then by
/// `time + manhattan(position, next waypoint)`. The search is therefore greedy
/// on progress and not cost-optimal across waypoint counts.
#[instrument(skip_all, name = "a_star", fields(agent = agent.id, start = %agent.start, waypoints = agent.waypoints.len()), level = "debug")]
pub fn a_star_search(
    map: &Map,
    agent: &Agent,
    constraints: &ConstraintSet,
    priority: Option<&PriorityContext>,
    horizon: usize,
    stats: &mut Stats,
) -> Result<Path, PlanError> {
    if agent.waypoints.is_empty() {
        return Ok(Path::new());
    }
    debug!("constraints: {}", constraints.len());

    let exhausted = PlanError::SearchExhausted {
        agent: agent.id,
        horizon,
    };
    let Some(start_time_step) =
        (0..horizon).find(|&time_step| !constraints.is_vertex_forbidden(agent.start, time_step))
    else {
        debug!("start cell is forbidden up to the horizon");
        return Err(exhausted);
    };

    let dwell_time = map.dwell_time();
    let waypoint_count = agent.waypoints.len();

    let mut nodes = Vec::new();
    let mut open_list = BinaryHeap::new();
    let mut closed_list = HashSet::new();

    let start = LowLevelNode {
        position: agent.start,
        progress: agent.progress(),
        time_step: start_time_step,
        parent: None,
    };
    closed_list.insert((start.position, start.time_step, start.progress));
    open_list.push(OpenEntry {
        label: start.progress.label,
        f_cost: start.time_step
            + heuristic(start.position, agent.waypoints.get(start.progress.label)),
        seq: 0,
        node: 0,
    });
    nodes.push(start);

    while let Some(entry) = open_list.pop() {
        let current = nodes[entry.node];
        trace!("expand node: {current:?}");
        stats.low_level_expand_nodes += 1;

        if current.progress.is_complete(waypoint_count) {
            return Ok(construct_path(&nodes, entry.node));
        }

        if current.time_step >= horizon {
            debug!("agent {} is stuck at the horizon", agent.id);
            return Err(exhausted);
        }

        let time_step = current.time_step + 1;
        for &neighbor in map.neighbors(current.position) {
            let Some(progress) =
                current
                    .progress
                    .step(current.position, neighbor, &agent.waypoints, dwell_time)
            else {
                continue; // Must wait at the checkpoint.
            };

            if constraints.is_violated(current.position, neighbor, time_step) {
                continue;
            }

            if priority.is_some_and(|context| context.blocks(current.position, neighbor, time_step))
            {
                continue;
            }

            if !closed_list.insert((neighbor, time_step, progress)) {
                continue;
            }

            open_list.push(OpenEntry {
                label: progress.label,
                f_cost: time_step + heuristic(neighbor, agent.waypoints.get(progress.label)),
                seq: nodes.len(),
                node: nodes.len(),
            });
            nodes.push(LowLevelNode {
                position: neighbor,
                progress,
                time_step,
                parent: Some(entry.node),
            });
        }
    }

    debug!("cannot find solution");
    Err(exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Constraint, Edge};

    // Helper function to setup tracing
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn cells(cells: &[(usize, usize)]) -> Vec<Position> {
        cells.iter().map(|&cell| Position::from(cell)).collect()
    }

    fn search(map: &Map, agent: &Agent, constraints: &ConstraintSet) -> Result<Path, PlanError> {
        a_star_search(map, agent, constraints, None, 200, &mut Stats::default())
    }

    fn assert_contiguous(path: &Path) {
        assert!(path.windows(2).all(|step| step[0].manhattan(&step[1]) <= 1));
    }

    // Ideal Path
    // [(2, 2), (1, 2), (0, 2), (0, 1), (0, 0)]
    // or
    // [(2, 2), (2, 1), (2, 0), (1, 0), (0, 0)]
    #[test]
    fn test_a_star_no_constraint() {
        init_tracing();
        let map = Map::new(3, 3);
        let agent = Agent::new(0, Position::new(2, 2)).with_waypoints([Position::new(0, 0)]);
        let path = search(&map, &agent, &ConstraintSet::new()).unwrap();
        debug!("{path:?}");
        assert_eq!(path.len(), 5);
        assert_eq!(path[0], Position::new(2, 2));
        assert_eq!(path[4], Position::new(0, 0));
        assert_contiguous(&path);
    }

    #[test]
    fn test_a_star_empty_queue() {
        init_tracing();
        let map = Map::new(3, 3);
        let agent = Agent::new(0, Position::new(1, 1));
        let mut constraints = ConstraintSet::new();
        constraints.insert(Constraint::Vertex {
            position: Position::new(1, 1),
            time_step: 0,
        });
        let mut stats = Stats::default();
        let path = a_star_search(&map, &agent, &constraints, None, 0, &mut stats).unwrap();
        assert!(path.is_empty());
        assert_eq!(stats.low_level_expand_nodes, 0);
    }

    #[test]
    fn test_a_star_vertex_constraint_alternative_path() {
        init_tracing();
        let map = Map::new(3, 3);
        let agent = Agent::new(0, Position::new(2, 2)).with_waypoints([Position::new(0, 0)]);
        let constraints: ConstraintSet = [Constraint::Vertex {
            position: Position::new(1, 2),
            time_step: 1,
        }]
        .into_iter()
        .collect();
        let path = search(&map, &agent, &constraints).unwrap();
        assert_eq!(path.len(), 5);
        assert_ne!(path[1], Position::new(1, 2));
    }

    #[test]
    fn test_a_star_vertex_constraint_forces_wait() {
        init_tracing();
        let map = Map::new(3, 1);
        let agent = Agent::new(0, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]);
        let constraints: ConstraintSet = [Constraint::Vertex {
            position: Position::new(1, 0),
            time_step: 1,
        }]
        .into_iter()
        .collect();
        let path = search(&map, &agent, &constraints).unwrap();
        assert_eq!(path, cells(&[(0, 0), (0, 0), (1, 0), (2, 0)]));
    }

    #[test]
    fn test_a_star_edge_constraint() {
        init_tracing();
        let map = Map::new(3, 1);
        let agent = Agent::new(0, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]);
        let constraints: ConstraintSet = [Constraint::Edge {
            edge: Edge::new(Position::new(1, 0), Position::new(2, 0)),
            time_step: 2,
        }]
        .into_iter()
        .collect();
        let path = search(&map, &agent, &constraints).unwrap();
        assert_eq!(path.len(), 4);
        assert_ne!(path[2], Position::new(2, 0));
        assert_eq!(path[3], Position::new(2, 0));
    }

    #[test]
    fn test_a_star_waypoints_in_order() {
        init_tracing();
        let map = Map::new(4, 1);
        let agent = Agent::new(0, Position::new(1, 0))
            .with_waypoints(cells(&[(3, 0), (0, 0)]));
        let path = search(&map, &agent, &ConstraintSet::new()).unwrap();
        assert_eq!(path, cells(&[(1, 0), (2, 0), (3, 0), (2, 0), (1, 0), (0, 0)]));
    }

    #[test]
    fn test_a_star_dwell() {
        init_tracing();
        let map = Map::new(4, 1).with_dwell_time(2);
        let agent = Agent::new(0, Position::new(0, 0))
            .with_waypoints(cells(&[(2, 0), (3, 0)]));
        let path = search(&map, &agent, &ConstraintSet::new()).unwrap();
        // Reach (2, 0) at t = 2 and hold it for two more ticks.
        assert_eq!(
            path,
            cells(&[(0, 0), (1, 0), (2, 0), (2, 0), (2, 0), (3, 0), (3, 0), (3, 0)])
        );
    }

    #[test]
    fn test_a_star_resumes_carried_dwell() {
        init_tracing();
        let map = Map::new(3, 1).with_dwell_time(3);
        let mut agent = Agent::new(0, Position::new(1, 0)).with_waypoints(cells(&[(1, 0)]));
        agent.dwell = Some(1);
        let path = search(&map, &agent, &ConstraintSet::new()).unwrap();
        assert_eq!(path, cells(&[(1, 0), (1, 0), (1, 0)]));
    }

    #[test]
    fn test_a_star_forbidden_start_is_padded() {
        init_tracing();
        let map = Map::new(3, 1);
        let agent = Agent::new(0, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]);
        let constraints: ConstraintSet = [Constraint::Vertex {
            position: Position::new(0, 0),
            time_step: 0,
        }]
        .into_iter()
        .collect();
        let path = search(&map, &agent, &constraints).unwrap();
        assert_eq!(path, cells(&[(0, 0), (0, 0), (1, 0), (2, 0)]));
    }

    #[test]
    fn test_a_star_priority_context() {
        init_tracing();
        let map = Map::new(3, 2);
        let paths = vec![
            cells(&[(1, 1), (1, 0), (1, 1)]),
            Path::new(),
        ];
        let context = PriorityContext {
            paths: &paths,
            higher: &[0],
            window: None,
        };
        let agent = Agent::new(1, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]);
        let path = a_star_search(
            &map,
            &agent,
            &ConstraintSet::new(),
            Some(&context),
            50,
            &mut Stats::default(),
        )
        .unwrap();
        assert_ne!(path[1], Position::new(1, 0));
        assert_eq!(path.len(), 4);
        assert_contiguous(&path);

        // Outside the window the higher-priority route no longer matters.
        let context = PriorityContext {
            window: Some(1),
            ..context
        };
        let path = a_star_search(
            &map,
            &agent,
            &ConstraintSet::new(),
            Some(&context),
            50,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path, cells(&[(0, 0), (1, 0), (2, 0)]));
    }

    #[test]
    fn test_a_star_horizon() {
        init_tracing();
        let map = Map::new(3, 1).with_obstacles([Position::new(1, 0)]);
        let agent = Agent::new(4, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]);
        let result = a_star_search(&map, &agent, &ConstraintSet::new(), None, 20, &mut Stats::default());
        assert_eq!(
            result,
            Err(PlanError::SearchExhausted {
                agent: 4,
                horizon: 20
            })
        );
    }
}
