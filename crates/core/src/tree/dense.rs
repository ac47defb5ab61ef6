//! Flat dense tree layout.
//!
//! The matrix node allocates the full `rows × cols` edge grid at expansion;
//! each slot is filled on first access. Chance children are keyed by
//! observation in an `FxHashMap`.

use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::{ChanceNodeOps, MatrixNodeOps};

pub struct MatrixNode<A, O, MS, CS> {
    pub stats: MS,
    obs: Option<O>,
    row_actions: Vec<A>,
    col_actions: Vec<A>,
    terminal: bool,
    expanded: bool,
    edges: Vec<Option<Box<ChanceNode<A, O, MS, CS>>>>,
}

pub struct ChanceNode<A, O, MS, CS> {
    pub stats: CS,
    children: FxHashMap<O, Box<MatrixNode<A, O, MS, CS>>>,
}

impl<A, O, MS: Default, CS> Default for MatrixNode<A, O, MS, CS> {
    fn default() -> Self {
        Self {
            stats: MS::default(),
            obs: None,
            row_actions: Vec::new(),
            col_actions: Vec::new(),
            terminal: false,
            expanded: false,
            edges: Vec::new(),
        }
    }
}

impl<A, O, MS, CS: Default> Default for ChanceNode<A, O, MS, CS> {
    fn default() -> Self {
        Self {
            stats: CS::default(),
            children: FxHashMap::default(),
        }
    }
}

impl<A, O, MS, CS> MatrixNodeOps<A, O> for MatrixNode<A, O, MS, CS>
where
    A: Copy + PartialEq + Debug + Send + Sync,
    O: Clone + Eq + Hash + Debug + Send + Sync,
    MS: Default + Send,
    CS: Default + Send,
{
    type Stats = MS;
    type Chance = ChanceNode<A, O, MS, CS>;

    fn stats(&self) -> &MS {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut MS {
        &mut self.stats
    }

    fn is_expanded(&self) -> bool {
        self.expanded
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn set_terminal(&mut self) {
        self.terminal = true;
    }

    fn obs(&self) -> Option<&O> {
        self.obs.as_ref()
    }

    fn rows(&self) -> usize {
        self.row_actions.len()
    }

    fn cols(&self) -> usize {
        self.col_actions.len()
    }

    fn row_actions(&self) -> &[A] {
        &self.row_actions
    }

    fn col_actions(&self) -> &[A] {
        &self.col_actions
    }

    fn expand(&mut self, row_actions: &[A], col_actions: &[A]) {
        self.row_actions = row_actions.to_vec();
        self.col_actions = col_actions.to_vec();
        self.edges = (0..row_actions.len() * col_actions.len())
            .map(|_| None)
            .collect();
        self.expanded = true;
    }

    fn access(&mut self, row_idx: usize, col_idx: usize) -> &mut Self::Chance {
        let idx = row_idx * self.col_actions.len() + col_idx;
        self.edges[idx].get_or_insert_with(Box::default)
    }

    fn child(&self, row_idx: usize, col_idx: usize) -> Option<&Self::Chance> {
        let idx = row_idx * self.col_actions.len() + col_idx;
        self.edges.get(idx)?.as_deref()
    }

    fn count_matrix_nodes(&self) -> usize {
        1 + self
            .edges
            .iter()
            .flatten()
            .map(|chance| chance.count_matrix_nodes())
            .sum::<usize>()
    }
}

impl<A, O, MS, CS> ChanceNodeOps<A, O> for ChanceNode<A, O, MS, CS>
where
    A: Copy + PartialEq + Debug + Send + Sync,
    O: Clone + Eq + Hash + Debug + Send + Sync,
    MS: Default + Send,
    CS: Default + Send,
{
    type Stats = CS;
    type Matrix = MatrixNode<A, O, MS, CS>;

    fn stats(&self) -> &CS {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut CS {
        &mut self.stats
    }

    fn access(&mut self, obs: &O) -> &mut Self::Matrix {
        self.children.entry(obs.clone()).or_insert_with(|| {
            let mut node = Box::new(MatrixNode::default());
            node.obs = Some(obs.clone());
            node
        })
    }

    fn child(&self, obs: &O) -> Option<&Self::Matrix> {
        self.children.get(obs).map(Box::as_ref)
    }

    fn count_matrix_nodes(&self) -> usize {
        self.children
            .values()
            .map(|child| child.count_matrix_nodes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    type Node = MatrixNode<u8, u8, u32, u32>;

    #[timed_test]
    fn expansion_allocates_the_full_grid() {
        let mut node = Node::default();
        node.expand(&[0, 1, 2], &[0, 1]);
        assert!(node.is_expanded());
        assert_eq!(node.rows(), 3);
        assert_eq!(node.cols(), 2);
        assert!(node.child(2, 1).is_none());
        node.access(2, 1);
        assert!(node.child(2, 1).is_some());
    }

    #[timed_test]
    fn chance_children_are_lazily_keyed_by_obs() {
        let mut node = Node::default();
        node.expand(&[0], &[0]);
        let chance = node.access(0, 0);
        assert!(chance.child(&7).is_none());
        chance.access(&7);
        chance.access(&7);
        chance.access(&9);
        assert_eq!(chance.count_matrix_nodes(), 2);
        assert_eq!(chance.child(&7).and_then(MatrixNodeOps::obs), Some(&7));
    }

    #[timed_test]
    fn node_counting_includes_the_root() {
        let mut root = Node::default();
        root.expand(&[0, 1], &[0, 1]);
        root.access(0, 0).access(&1);
        root.access(1, 1).access(&2);
        assert_eq!(root.count_matrix_nodes(), 3);
    }
}
