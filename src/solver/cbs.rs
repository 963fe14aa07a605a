use super::tree::ConstraintTree;
use super::{plan_independently, Solver};
use crate::algorithm::a_star_search;
use crate::common::{find_first_conflict, Agent, Solution};
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::time::Instant;
use tracing::{debug, instrument};

pub struct CBS {
    map: Map,
    window: Option<usize>,
    horizon: usize,
    tree: ConstraintTree,
    stats: Stats,
}

impl CBS {
    pub fn new(map: &Map, window: Option<usize>, horizon: usize) -> Self {
        CBS {
            map: map.clone(),
            window,
            horizon,
            tree: ConstraintTree::default(),
            stats: Stats::default(),
        }
    }
}

impl Solver for CBS {
    #[instrument(skip_all, name = "cbs", fields(agents = agents.len()))]
    fn solve(&mut self, agents: &[Agent]) -> Result<Solution, PlanError> {
        let total_solve_start_time = Instant::now();
        self.stats = Stats::default();

        let root = plan_independently(&self.map, agents, self.horizon, &mut self.stats)?;
        self.tree = ConstraintTree::with_root(root);

        let mut last_conflict = None;
        while let Some(current) = self.tree.pop() {
            let paths = self.tree.paths(current);
            let Some(conflict) = find_first_conflict(&paths, self.window) else {
                self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
                self.stats.costs = self.tree.cost(current);
                debug!("accept node {current} of {}", self.tree.len());
                self.stats.print();
                return Ok(Solution { paths });
            };
            debug!("{conflict}");
            self.stats.high_level_expand_nodes += 1;

            for agent in [conflict.agent_1, conflict.agent_2] {
                let constraint = conflict.constraint_for(agent);
                let mut constraints = self.tree.constraints(current, agent);
                constraints.insert(constraint);

                match a_star_search(
                    &self.map,
                    &agents[agent],
                    &constraints,
                    None,
                    self.horizon,
                    &mut self.stats,
                ) {
                    Ok(path) => {
                        let cost = self.tree.cost(current) + path.len() - paths[agent].len();
                        self.tree
                            .push_child(current, (agent, constraint), None, vec![(agent, path)], cost);
                    }
                    Err(err) => debug!("prune child of agent {agent}: {err}"),
                }
            }
            last_conflict = Some(conflict);
        }

        Err(PlanError::PlanningTreeExhausted {
            expanded: self.stats.high_level_expand_nodes,
            last_conflict,
        })
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;
    use crate::solver::test_utils::{assert_reaches_goals, corridor_agents, init_tracing};

    #[test]
    fn test_cbs_corridor_swap() {
        init_tracing();
        let map = Map::new(3, 1);
        let agents = corridor_agents();
        let mut solver = CBS::new(&map, Some(2), 100);
        let solution = solver.solve(&agents).unwrap();

        assert!(solution.verify(&map, Some(2)));
        assert_reaches_goals(&solution, &agents);
        assert_eq!(solution.cost(), 7);
        assert_eq!(solver.stats().costs, 7);
        let waiting = solution
            .paths
            .iter()
            .filter(|path| path.windows(2).any(|step| step[0] == step[1]))
            .count();
        assert_eq!(waiting, 1);
    }

    #[test]
    fn test_cbs_pocket_swap() {
        init_tracing();
        // One-lane corridor with a side pocket under the middle cell.
        let map = Map::new(3, 2).with_obstacles([Position::new(0, 1), Position::new(2, 1)]);
        let agents = corridor_agents();
        let mut solver = CBS::new(&map, None, 100);
        let solution = solver.solve(&agents).unwrap();

        assert!(solution.verify(&map, None));
        assert_reaches_goals(&solution, &agents);
        assert!(solution.paths.iter().any(|path| path.contains(&Position::new(1, 1))));
    }

    #[test]
    fn test_cbs_accepts_conflict_free_root() {
        init_tracing();
        let map = Map::new(3, 3);
        let agents = vec![
            Agent::new(0, Position::new(0, 0)).with_waypoints([Position::new(2, 0)]),
            Agent::new(1, Position::new(0, 2)).with_waypoints([Position::new(2, 2)]),
        ];
        let mut solver = CBS::new(&map, None, 100);
        solver.solve(&agents).unwrap();
        assert_eq!(solver.stats().high_level_expand_nodes, 0);
        assert_eq!(solver.tree.len(), 1);
    }

    #[test]
    fn test_cbs_is_deterministic() {
        init_tracing();
        let map = Map::new(4, 4).with_obstacles([Position::new(1, 1), Position::new(2, 2)]);
        let agents = vec![
            Agent::new(0, Position::new(0, 0)).with_waypoints([Position::new(3, 3)]),
            Agent::new(1, Position::new(3, 3)).with_waypoints([Position::new(0, 0)]),
            Agent::new(2, Position::new(0, 3)).with_waypoints([Position::new(3, 0)]),
        ];
        let first = CBS::new(&map, Some(5), 100).solve(&agents).unwrap();
        let second = CBS::new(&map, Some(5), 100).solve(&agents).unwrap();
        assert_eq!(first, second);
        assert!(first.verify(&map, Some(5)));
    }
}
