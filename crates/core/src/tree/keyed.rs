//! Hashmap-keyed tree layout.
//!
//! Edges live in an `FxHashMap` keyed by `(row, col)`. Nothing is allocated
//! for unvisited action pairs, which suits bandit search over wide matrices;
//! the trade-off is a map probe on every access.

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
    edges: FxHashMap<(u16, u16), Box<ChanceNode<A, O, MS, CS>>>,
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
            edges: FxHashMap::default(),
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

#[allow(clippy::cast_possible_truncation)]
fn key(row_idx: usize, col_idx: usize) -> (u16, u16) {
    debug_assert!(row_idx <= usize::from(u16::MAX) && col_idx <= usize::from(u16::MAX));
    (row_idx as u16, col_idx as u16)
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
        self.expanded = true;
    }

    fn access(&mut self, row_idx: usize, col_idx: usize) -> &mut Self::Chance {
        self.edges
            .entry(key(row_idx, col_idx))
            .or_insert_with(Box::default)
    }

    fn child(&self, row_idx: usize, col_idx: usize) -> Option<&Self::Chance> {
        self.edges.get(&key(row_idx, col_idx)).map(Box::as_ref)
    }

    fn count_matrix_nodes(&self) -> usize {
        1 + self
            .edges
            .values()
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
    fn unvisited_cells_cost_nothing() {
        let mut node = Node::default();
        node.expand(&[0, 1, 2, 3], &[0, 1, 2, 3]);
        assert!(node.child(3, 3).is_none());
        node.access(3, 3).access(&1);
        assert_eq!(node.count_matrix_nodes(), 2);
    }

    #[timed_test]
    fn repeated_access_returns_the_same_edge() {
        let mut node = Node::default();
        node.expand(&[0, 1], &[0, 1]);
        node.access(0, 1).stats = 5;
        assert_eq!(node.access(0, 1).stats, 5);
    }
}
