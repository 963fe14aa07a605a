use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// Directed graph over agent ids; an edge `high -> low` makes `high`'s route a
/// fixed obstacle for `low`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityGraph {
    lower: Vec<BTreeSet<usize>>,
}

impl PriorityGraph {
    pub fn new(agents: usize) -> Self {
        PriorityGraph {
            lower: vec![BTreeSet::new(); agents],
        }
    }

    pub fn add_edge(&mut self, high: usize, low: usize) -> bool {
        self.lower[high].insert(low)
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.lower
            .iter()
            .enumerate()
            .flat_map(|(high, lows)| lows.iter().map(move |&low| (high, low)))
    }

    pub fn has_path(&self, from: usize, to: usize) -> bool {
        let mut visited = vec![false; self.lower.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut visited[current], true) {
                continue;
            }
            stack.extend(self.lower[current].iter().copied());
        }
        false
    }

    pub fn would_create_cycle(&self, high: usize, low: usize) -> bool {
        self.has_path(low, high)
    }

    /// Planning order, highest priority first. Among agents whose predecessors
    /// are all placed, the smallest id goes first. `None` if the graph has a
    /// cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree = vec![0; self.lower.len()];
        for (_, low) in self.edges() {
            in_degree[low] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(agent, _)| Reverse(agent))
            .collect();

        let mut order = Vec::with_capacity(self.lower.len());
        while let Some(Reverse(agent)) = ready.pop() {
            order.push(agent);
            for &low in &self.lower[agent] {
                in_degree[low] -= 1;
                if in_degree[low] == 0 {
                    ready.push(Reverse(low));
                }
            }
        }

        (order.len() == self.lower.len()).then_some(order)
    }
}
