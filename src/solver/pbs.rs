use super::tree::ConstraintTree;
use super::{plan_independently, Solver};
use crate::algorithm::{a_star_search, PriorityContext};
use crate::common::{find_first_conflict, paths_conflict, Agent, Conflict, Path, Solution};
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Priority-based search: every conflict is resolved by ordering the two
/// agents and re-planning the lower one around the higher one's route.
pub struct PBS {
    map: Map,
    window: Option<usize>,
    horizon: usize,
    tree: ConstraintTree,
    stats: Stats,
}

impl PBS {
    pub fn new(map: &Map, window: Option<usize>, horizon: usize) -> Self {
        PBS {
            map: map.clone(),
            window,
            horizon,
            tree: ConstraintTree::default(),
            stats: Stats::default(),
        }
    }

    /// Child of `parent` in which `high` takes precedence over `low`.
    fn expand(
        &mut self,
        agents: &[Agent],
        parent: usize,
        parent_paths: &[Path],
        conflict: &Conflict,
        low: usize,
        high: usize,
    ) -> Option<usize> {
        let mut graph = self.tree.priority_graph(parent);
        if graph.would_create_cycle(high, low) {
            warn!("agent {low} already outranks agent {high}, skip child");
            return None;
        }
        graph.add_edge(high, low);
        let order = graph.topological_order()?;

        let constraint = conflict.constraint_for(low);
        let mut paths = parent_paths.to_vec();
        let mut replanned = Vec::new();

        for (rank, &agent) in order.iter().enumerate() {
            let higher = &order[..rank];
            if agent != low
                && !higher
                    .iter()
                    .any(|&other| paths_conflict(&paths[agent], &paths[other], self.window))
            {
                continue;
            }

            let mut constraints = self.tree.constraints(parent, agent);
            if agent == low {
                constraints.insert(constraint);
            }
            let context = PriorityContext {
                paths: &paths,
                higher,
                window: self.window,
            };
            match a_star_search(
                &self.map,
                &agents[agent],
                &constraints,
                Some(&context),
                self.horizon,
                &mut self.stats,
            ) {
                Ok(path) => {
                    paths[agent] = path.clone();
                    replanned.push((agent, path));
                }
                Err(err) => {
                    debug!("prune child {high} > {low}: {err}");
                    return None;
                }
            }
        }

        let cost = paths.iter().map(Vec::len).sum();
        Some(
            self.tree
                .push_child(parent, (low, constraint), Some((high, low)), replanned, cost),
        )
    }
}

impl Solver for PBS {
    #[instrument(skip_all, name = "pbs", fields(agents = agents.len()))]
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

            for (low, high) in [
                (conflict.agent_1, conflict.agent_2),
                (conflict.agent_2, conflict.agent_1),
            ] {
                self.expand(agents, current, &paths, &conflict, low, high);
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
