use crate::algorithm::PriorityGraph;
use crate::common::{Constraint, ConstraintSet, Path};

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One resolver state, stored as the change it makes to its parent.
#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    parent: Option<usize>,
    constraint: Option<(usize, Constraint)>,
    priority: Option<(usize, usize)>, // (high, low)
    replanned: Vec<(usize, Path)>,
    cost: usize,
}

/// Arena of resolver states explored best-first by ascending cost. Equal costs
/// pop in insertion order.
#[derive(Debug, Default)]
pub(crate) struct ConstraintTree {
    agents: usize,
    nodes: Vec<TreeNode>,
    open: BinaryHeap<Reverse<(usize, usize)>>,
}

impl ConstraintTree {
    pub(crate) fn with_root(paths: Vec<Path>) -> Self {
        let cost = paths.iter().map(Vec::len).sum();
        let mut tree = ConstraintTree {
            agents: paths.len(),
            nodes: Vec::new(),
            open: BinaryHeap::new(),
        };
        tree.insert(TreeNode {
            parent: None,
            constraint: None,
            priority: None,
            replanned: paths.into_iter().enumerate().collect(),
            cost,
        });
        tree
    }

    fn insert(&mut self, node: TreeNode) -> usize {
        let index = self.nodes.len();
        self.open.push(Reverse((node.cost, index)));
        self.nodes.push(node);
        index
    }

    pub(crate) fn push_child(
        &mut self,
        parent: usize,
        constraint: (usize, Constraint),
        priority: Option<(usize, usize)>,
        replanned: Vec<(usize, Path)>,
        cost: usize,
    ) -> usize {
        self.insert(TreeNode {
            parent: Some(parent),
            constraint: Some(constraint),
            priority,
            replanned,
            cost,
        })
    }

    pub(crate) fn pop(&mut self) -> Option<usize> {
        self.open.pop().map(|Reverse((_, index))| index)
    }

    pub(crate) fn cost(&self, index: usize) -> usize {
        self.nodes[index].cost
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn lineage(&self, index: usize) -> impl Iterator<Item = &TreeNode> + '_ {
        std::iter::successors(Some(&self.nodes[index]), |node| {
            node.parent.map(|parent| &self.nodes[parent])
        })
    }

    /// Current route of every agent in state `index`.
    pub(crate) fn paths(&self, index: usize) -> Vec<Path> {
        let mut paths: Vec<Option<&Path>> = vec![None; self.agents];
        for node in self.lineage(index) {
            for (agent, path) in &node.replanned {
                paths[*agent].get_or_insert(path);
            }
        }
        paths
            .into_iter()
            .map(|path| path.cloned().unwrap_or_default())
            .collect()
    }

    pub(crate) fn constraints(&self, index: usize, agent: usize) -> ConstraintSet {
        self.lineage(index)
            .filter_map(|node| node.constraint)
            .filter(|(owner, _)| *owner == agent)
            .map(|(_, constraint)| constraint)
            .collect()
    }

    pub(crate) fn priority_graph(&self, index: usize) -> PriorityGraph {
        let mut graph = PriorityGraph::new(self.agents);
        for (high, low) in self.lineage(index).filter_map(|node| node.priority) {
            graph.add_edge(high, low);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;

    fn constraint(x: usize, time_step: usize) -> Constraint {
        Constraint::Vertex {
            position: Position::new(x, 0),
            time_step,
        }
    }

    #[test]
    fn test_lazy_reconstruction_keeps_siblings_apart() {
        let root_paths = vec![vec![Position::new(0, 0)], vec![Position::new(1, 0)]];
        let mut tree = ConstraintTree::with_root(root_paths.clone());
        assert_eq!(tree.pop(), Some(0));

        let left = tree.push_child(
            0,
            (0, constraint(1, 1)),
            Some((1, 0)),
            vec![(0, vec![Position::new(0, 0), Position::new(0, 0)])],
            3,
        );
        let right = tree.push_child(0, (1, constraint(0, 1)), Some((0, 1)), vec![], 2);
        let grandchild = tree.push_child(left, (0, constraint(2, 2)), None, vec![], 3);

        assert_eq!(tree.paths(right), root_paths);
        assert_eq!(tree.paths(grandchild)[0].len(), 2);
        assert_eq!(tree.constraints(grandchild, 0).len(), 2);
        assert!(tree.constraints(grandchild, 1).is_empty());
        assert!(tree.constraints(right, 0).is_empty());

        assert_eq!(tree.priority_graph(grandchild).edges().collect::<Vec<_>>(), vec![(1, 0)]);
        assert_eq!(tree.priority_graph(right).edges().collect::<Vec<_>>(), vec![(0, 1)]);

        // Cheapest first, then insertion order.
        assert_eq!(tree.pop(), Some(right));
        assert_eq!(tree.pop(), Some(left));
        assert_eq!(tree.pop(), Some(grandchild));
        assert_eq!(tree.pop(), None);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.cost(left), 3);
    }
}
