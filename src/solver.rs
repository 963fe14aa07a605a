mod cbs;
mod pbs;
mod tree;

pub use cbs::CBS;
pub use pbs::PBS;

use crate::algorithm::a_star_search;
use crate::common::{Agent, ConstraintSet, Path, Solution};
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Solver {
    fn solve(&mut self, agents: &[Agent]) -> Result<Solution, PlanError>;

    fn stats(&self) -> &Stats;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Pbs,
    Cbs,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Pbs => write!(f, "pbs"),
            SolverKind::Cbs => write!(f, "cbs"),
        }
    }
}

pub fn build_solver(
    kind: SolverKind,
    map: &Map,
    window: Option<usize>,
    horizon: usize,
) -> Box<dyn Solver + Send> {
    match kind {
        SolverKind::Pbs => Box::new(PBS::new(map, window, horizon)),
        SolverKind::Cbs => Box::new(CBS::new(map, window, horizon)),
    }
}

/// Plans every agent on its own, ignoring the others.
pub(crate) fn plan_independently(
    map: &Map,
    agents: &[Agent],
    horizon: usize,
    stats: &mut Stats,
) -> Result<Vec<Path>, PlanError> {
    agents
        .iter()
        .map(|agent| a_star_search(map, agent, &ConstraintSet::new(), None, horizon, stats))
        .collect()
}
