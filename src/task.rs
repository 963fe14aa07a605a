use crate::map::Map;

use anyhow::ensure;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

/// Move a load from an induct checkpoint to an eject checkpoint, both given
/// as indices into the map's checkpoint lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub pickup: usize,
    pub dropoff: usize,
}

pub trait TaskSource {
    fn next_assignment(&mut self) -> Option<Assignment>;

    fn remaining_count(&self) -> usize;

    fn has_remaining_work(&self) -> bool {
        self.remaining_count() > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskAssigner {
    assignments: VecDeque<Assignment>,
}

impl TaskAssigner {
    /// Generates `count` assignments in which every checkpoint appears at least
    /// once, in random order.
    pub fn new<R: Rng + ?Sized>(
        induct_count: usize,
        eject_count: usize,
        count: usize,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        ensure!(induct_count > 0, "need at least one induct checkpoint");
        ensure!(eject_count > 0, "need at least one eject checkpoint");
        ensure!(
            count >= induct_count.max(eject_count),
            "{count} assignments can't visit all {} checkpoints",
            induct_count.max(eject_count)
        );

        let mut shuffled = |size: usize| {
            let mut permutation: Vec<usize> = (0..size).collect();
            permutation.shuffle(rng);
            permutation
        };
        let induct = shuffled(induct_count);
        let eject = shuffled(eject_count);

        let mut assignments: Vec<Assignment> = (0..count)
            .map(|idx| Assignment {
                pickup: induct
                    .get(idx)
                    .copied()
                    .unwrap_or_else(|| induct[rng.gen_range(0..induct_count)]),
                dropoff: eject
                    .get(idx)
                    .copied()
                    .unwrap_or_else(|| eject[rng.gen_range(0..eject_count)]),
            })
            .collect();
        assignments.shuffle(rng);

        info!("Generated {count} assignments");
        Ok(TaskAssigner {
            assignments: assignments.into(),
        })
    }

    pub fn for_map<R: Rng + ?Sized>(map: &Map, count: usize, rng: &mut R) -> anyhow::Result<Self> {
        map.validate_checkpoints()?;
        Self::new(
            map.induct_checkpoints().len(),
            map.eject_checkpoints().len(),
            count,
            rng,
        )
    }

    pub fn from_assignments(assignments: impl IntoIterator<Item = Assignment>) -> Self {
        TaskAssigner {
            assignments: assignments.into_iter().collect(),
        }
    }
}

impl TaskSource for TaskAssigner {
    fn next_assignment(&mut self) -> Option<Assignment> {
        self.assignments.pop_front()
    }

    fn remaining_count(&self) -> usize {
        self.assignments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_every_checkpoint_is_used() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tasks = TaskAssigner::new(4, 6, 10, &mut rng).unwrap();
        assert_eq!(tasks.remaining_count(), 10);

        let drained: Vec<Assignment> = std::iter::from_fn(|| tasks.next_assignment()).collect();
        assert_eq!(drained.len(), 10);
        assert!(!tasks.has_remaining_work());
        let pickups: HashSet<usize> = drained.iter().map(|a| a.pickup).collect();
        let dropoffs: HashSet<usize> = drained.iter().map(|a| a.dropoff).collect();
        assert_eq!(pickups.len(), 4);
        assert_eq!(dropoffs.len(), 6);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let drain = |mut tasks: TaskAssigner| -> Vec<Assignment> {
            std::iter::from_fn(|| tasks.next_assignment()).collect()
        };
        let first = drain(TaskAssigner::new(3, 3, 20, &mut StdRng::seed_from_u64(5)).unwrap());
        let second = drain(TaskAssigner::new(3, 3, 20, &mut StdRng::seed_from_u64(5)).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_bad_counts() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(TaskAssigner::new(0, 2, 5, &mut rng).is_err());
        assert!(TaskAssigner::new(2, 0, 5, &mut rng).is_err());
        assert!(TaskAssigner::new(4, 2, 3, &mut rng).is_err());
    }

    #[test]
    fn test_drains_in_order() {
        let mut tasks = TaskAssigner::from_assignments([
            Assignment {
                pickup: 1,
                dropoff: 0,
            },
            Assignment {
                pickup: 0,
                dropoff: 1,
            },
        ]);
        assert!(tasks.has_remaining_work());
        assert_eq!(tasks.next_assignment().map(|a| a.pickup), Some(1));
        assert_eq!(tasks.next_assignment().map(|a| a.pickup), Some(0));
        assert_eq!(tasks.next_assignment(), None);
        assert!(!tasks.has_remaining_work());
    }
}
