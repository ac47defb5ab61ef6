//! Tree-bandit (MCTS-style) search.
//!
//! Each iteration clones the root state, reseeds its chance source from the
//! search PRNG, and descends: the bandit selects a joint action at every
//! expanded node, the sampled observation picks the chance child, and a leaf
//! (terminal or freshly expanded) supplies the value that is back-propagated
//! through the bandit's `update` calls on the way out. No statistics are
//! touched until the recursion returns, so an iteration that errors commits
//! nothing.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::bandit::Bandit;
use crate::error::SearchError;
use crate::game::State;
use crate::model::{Model, ModelOutput};
use crate::tree::{ChanceNodeOps, MatrixNodeOps};

/// Which value an iteration back-propagates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backprop {
    /// The leaf's payoff or model value.
    #[default]
    Leaf,
    /// The child node's empirical average (MCTS-A style).
    NodeAverage,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeBanditConfig {
    /// Stop the iteration at a freshly expanded node instead of selecting
    /// through it.
    pub return_after_expand: bool,
    pub backprop: Backprop,
}

impl Default for TreeBanditConfig {
    fn default() -> Self {
        Self {
            return_after_expand: true,
            backprop: Backprop::Leaf,
        }
    }
}

/// Iteration-budgeted search parameterized by a bandit policy and generic
/// over the tree layout.
#[derive(Debug, Clone)]
pub struct TreeBandit<B> {
    bandit: B,
    config: TreeBanditConfig,
}

impl<B> TreeBandit<B> {
    pub fn new(bandit: B) -> Self {
        Self {
            bandit,
            config: TreeBanditConfig::default(),
        }
    }

    pub fn with_config(bandit: B, config: TreeBanditConfig) -> Self {
        Self { bandit, config }
    }

    pub fn bandit(&self) -> &B {
        &self.bandit
    }
}

impl<B> TreeBandit<B> {
    /// Run a fixed number of iterations; returns elapsed milliseconds.
    pub fn run_for_iterations<S, M, G, MN>(
        &self,
        iterations: u64,
        rng: &mut G,
        state: &S,
        model: &mut M,
        root: &mut MN,
    ) -> Result<u128, SearchError>
    where
        S: State,
        B: Bandit<S::Real>,
        M: Model<S>,
        G: Rng,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = B::MatrixStats>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = B::ChanceStats>,
    {
        let start = Instant::now();
        let mut output = ModelOutput::default();
        for _ in 0..iterations {
            let mut scratch = state.clone();
            scratch.randomize_transition(rng.gen());
            scratch.update_actions();
            self.run_iteration(rng, &mut scratch, model, root, &mut output)?;
        }
        Ok(start.elapsed().as_millis())
    }

    /// Run until the wall-clock budget is spent; the budget is polled
    /// between iterations. Returns the number of completed iterations.
    pub fn run<S, M, G, MN>(
        &self,
        budget: Duration,
        rng: &mut G,
        state: &S,
        model: &mut M,
        root: &mut MN,
    ) -> Result<u64, SearchError>
    where
        S: State,
        B: Bandit<S::Real>,
        M: Model<S>,
        G: Rng,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = B::MatrixStats>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = B::ChanceStats>,
    {
        let start = Instant::now();
        let mut output = ModelOutput::default();
        let mut iterations = 0;
        while start.elapsed() < budget {
            let mut scratch = state.clone();
            scratch.randomize_transition(rng.gen());
            scratch.update_actions();
            self.run_iteration(rng, &mut scratch, model, root, &mut output)?;
            iterations += 1;
        }
        Ok(iterations)
    }

    fn run_iteration<S, M, G, MN>(
        &self,
        rng: &mut G,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
        output: &mut ModelOutput<S::Real>,
    ) -> Result<(), SearchError>
    where
        S: State,
        B: Bandit<S::Real>,
        M: Model<S>,
        G: Rng,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = B::MatrixStats>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = B::ChanceStats>,
    {
        if state.is_terminal() {
            node.set_terminal();
            output.value = state.payoff();
            return Ok(());
        }

        if !node.is_expanded() {
            let rows = state.row_actions().len();
            let cols = state.col_actions().len();
            if rows == 0 {
                return Err(SearchError::EmptyActionSet { side: "row" });
            }
            if cols == 0 {
                return Err(SearchError::EmptyActionSet { side: "col" });
            }
            model.inference(state.clone(), output);
            if !output.row_policy.is_empty() && output.row_policy.len() != rows {
                return Err(SearchError::PolicyLengthMismatch {
                    expected: rows,
                    actual: output.row_policy.len(),
                });
            }
            if !output.col_policy.is_empty() && output.col_policy.len() != cols {
                return Err(SearchError::PolicyLengthMismatch {
                    expected: cols,
                    actual: output.col_policy.len(),
                });
            }
            node.expand(state.row_actions(), state.col_actions());
            self.bandit.expand(rows, cols, output, node.stats_mut());
            if self.config.return_after_expand {
                return Ok(());
            }
        }

        let mut outcome = self.bandit.select(rng, node.stats());
        let row_action = node.row_actions()[outcome.row_idx];
        let col_action = node.col_actions()[outcome.col_idx];
        state.apply_actions(row_action, col_action);
        state.update_actions();

        let chance = node.access(outcome.row_idx, outcome.col_idx);
        let child = chance.access(&state.obs());
        self.run_iteration(rng, state, model, child, output)?;

        outcome.value = match self.config.backprop {
            Backprop::Leaf => output.value,
            Backprop::NodeAverage => self.bandit.empirical_value(child.stats()),
        };
        self.bandit.update_chance_stats(chance.stats_mut(), &outcome);
        self.bandit.update_matrix_stats(node.stats_mut(), &outcome);
        Ok(())
    }
}
