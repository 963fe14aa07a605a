use crate::common::Conflict;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The single-agent search hit its time horizon. Resolvers prune the branch
    /// that caused it; at the root it is fatal for the iteration.
    #[error("search for agent {agent} exceeded the time horizon {horizon}")]
    SearchExhausted { agent: usize, horizon: usize },

    /// Every branch of the resolver was pruned.
    #[error("planning tree exhausted after {expanded} expanded nodes, last conflict: {last_conflict:?}")]
    PlanningTreeExhausted {
        expanded: usize,
        last_conflict: Option<Conflict>,
    },
}
