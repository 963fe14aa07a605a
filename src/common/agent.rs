use super::{Path, Position, Solution};
use crate::map::Map;
use crate::task::TaskSource;

use anyhow::ensure;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: Position,
    pub waypoints: VecDeque<Position>,
    /// Ticks already spent dwelling on `waypoints[0]`, carried across windows.
    #[serde(default)]
    pub dwell: Option<usize>,
    /// Completed waypoints with the absolute timestep they were completed at.
    #[serde(default)]
    pub history: Vec<(Position, usize)>,
}

impl Agent {
    pub fn new(id: usize, start: Position) -> Self {
        Agent {
            id,
            start,
            waypoints: VecDeque::new(),
            dwell: None,
            history: Vec::new(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: impl IntoIterator<Item = Position>) -> Self {
        self.waypoints.extend(waypoints);
        self
    }

    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start) && self.waypoints.iter().all(|w| map.is_passable(*w))
    }

    /// Manhattan travel through every queued waypoint plus the dwell owed at each.
    pub fn lower_bound_cost(&self, dwell_time: usize) -> usize {
        let mut current = self.start;
        let mut cost = 0;
        for waypoint in &self.waypoints {
            cost += current.manhattan(waypoint) + dwell_time;
            current = *waypoint;
        }
        cost.saturating_sub(self.dwell.unwrap_or(0))
    }

    pub fn progress(&self) -> Progress {
        Progress {
            label: 0,
            dwell: self.dwell,
        }
    }
}

/// How far an agent got through its waypoint queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Progress {
    /// Index of the next unvisited waypoint.
    pub label: usize,
    /// Ticks spent on a reached waypoint that does not count as visited yet.
    pub dwell: Option<usize>,
}

impl Progress {
    /// Progress after moving `current -> next`, or `None` if the move is not
    /// allowed because the agent is dwelling.
    pub fn step(
        self,
        current: Position,
        next: Position,
        waypoints: &VecDeque<Position>,
        dwell_time: usize,
    ) -> Option<Progress> {
        match self.dwell {
            Some(_) if current != next => None,
            Some(ticks) if ticks + 1 >= dwell_time => Some(Progress {
                label: self.label + 1,
                dwell: None,
            }),
            Some(ticks) => Some(Progress {
                label: self.label,
                dwell: Some(ticks + 1),
            }),
            None => match waypoints.get(self.label) {
                Some(waypoint) if *waypoint == next && dwell_time == 0 => Some(Progress {
                    label: self.label + 1,
                    dwell: None,
                }),
                Some(waypoint) if *waypoint == next => Some(Progress {
                    label: self.label,
                    dwell: Some(0),
                }),
                _ => Some(self),
            },
        }
    }

    pub fn is_complete(&self, waypoint_count: usize) -> bool {
        self.label >= waypoint_count && self.dwell.is_none()
    }
}

/// The agents of one run together with the motion executed so far.
#[derive(Debug, Clone, Serialize)]
pub struct Fleet {
    agents: Vec<Agent>,
    trajectories: Vec<Path>,
    elapsed: usize,
}

impl Fleet {
    /// Agent ids are reassigned to their index.
    pub fn new(agents: Vec<Agent>) -> Self {
        let agents: Vec<Agent> = agents
            .into_iter()
            .enumerate()
            .map(|(id, agent)| Agent { id, ..agent })
            .collect();
        Fleet {
            trajectories: vec![Path::new(); agents.len()],
            agents,
            elapsed: 0,
        }
    }

    /// Places `count` agents on distinct free cells.
    pub fn random<R: Rng + ?Sized>(map: &Map, count: usize, rng: &mut R) -> anyhow::Result<Self> {
        let mut spare = map.spare_locations();
        ensure!(
            spare.len() >= count,
            "can't place {count} agents on {} free cells",
            spare.len()
        );
        spare.shuffle(rng);
        Ok(Fleet::new(
            spare
                .into_iter()
                .take(count)
                .enumerate()
                .map(|(id, start)| Agent::new(id, start))
                .collect(),
        ))
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Executed positions per agent: the committed prefixes of each route,
    /// concatenated. A route shorter than the window adds fewer than `window`
    /// entries, so an index here is not an absolute timestep once that happens.
    /// `Agent::history` and `elapsed` carry absolute time.
    pub fn trajectories(&self) -> &[Path] {
        &self.trajectories
    }

    pub fn elapsed(&self) -> usize {
        self.elapsed
    }

    pub fn has_pending_waypoints(&self) -> bool {
        self.agents.iter().any(|agent| !agent.waypoints.is_empty())
    }

    pub fn into_parts(self) -> (Vec<Agent>, Vec<Path>) {
        (self.agents, self.trajectories)
    }

    /// Pulls assignments until every agent has more than `window` timesteps of
    /// known work or the source runs dry. Returns how many were pulled.
    pub fn update_task_lists<S, R>(
        &mut self,
        source: &mut S,
        map: &Map,
        window: usize,
        rng: &mut R,
    ) -> usize
    where
        S: TaskSource + ?Sized,
        R: Rng + ?Sized,
    {
        let mut pulled = 0;
        for agent in &mut self.agents {
            while agent.lower_bound_cost(map.dwell_time()) <= window {
                let Some(assignment) = source.next_assignment() else {
                    break;
                };
                pulled += 1;

                let Some(&pickup) = map.induct_checkpoints().get(assignment.pickup) else {
                    warn!("assignment {assignment:?} names an unknown induct checkpoint");
                    continue;
                };
                agent.waypoints.push_back(pickup);
                match map.dropoff_location(assignment.dropoff, rng) {
                    Some(dropoff) => agent.waypoints.push_back(dropoff),
                    None => warn!("eject checkpoint {} has no free neighbour", assignment.dropoff),
                }
                debug!("agent {} takes {assignment:?}", agent.id);
            }
        }
        pulled
    }

    /// Executes the first `window` timesteps of `solution`. Completed waypoints
    /// move to the agents' history and each agent restarts from the route
    /// position at index `window`. Returns whether any waypoint is still pending.
    pub fn commit(&mut self, solution: &Solution, window: usize, dwell_time: usize) -> bool {
        for (agent, path) in self.agents.iter_mut().zip(&solution.paths) {
            if path.is_empty() {
                continue;
            }
            self.trajectories[agent.id].extend_from_slice(&path[..window.min(path.len())]);

            let last = window.min(path.len() - 1);
            let mut progress = agent.progress();
            for time_step in 1..=last {
                let Some(next) =
                    progress.step(path[time_step - 1], path[time_step], &agent.waypoints, dwell_time)
                else {
                    warn!("agent {} left a waypoint while dwelling", agent.id);
                    continue;
                };
                if next.label > progress.label {
                    agent
                        .history
                        .push((agent.waypoints[progress.label], self.elapsed + time_step));
                }
                progress = next;
            }

            agent.waypoints.drain(..progress.label.min(agent.waypoints.len()));
            agent.dwell = progress.dwell;
            agent.start = path[last];
        }
        self.elapsed += window;
        self.has_pending_waypoints()
    }
}
