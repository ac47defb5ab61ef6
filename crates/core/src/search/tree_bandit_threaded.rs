//! Multi-threaded tree-bandit search over a shared tree.
//!
//! Workers run independent iterations against shared nodes. Node expansion
//! is published exactly once (losing workers block briefly, then reuse the
//! winner's allocation); bandit statistics are serialized behind a per-node
//! mutex, with `select` reading a snapshot under that lock; the
//! observation-keyed child map sits behind a per-chance-node mutex and hands
//! out `Arc` children so the lock is dropped before recursing. Iteration
//! updates remain commutative sums, so the result distribution matches the
//! single-threaded search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use super::tree_bandit::{Backprop, TreeBanditConfig};
use crate::bandit::Bandit;
use crate::error::SearchError;
use crate::game::State;
use crate::model::{Model, ModelOutput};

/// Shared matrix node: expansion body behind a once-cell, stats behind a
/// mutex.
pub struct SyncMatrixNode<A, O, MS, CS> {
    body: OnceLock<NodeBody<A, O, MS, CS>>,
    terminal: AtomicBool,
}

struct NodeBody<A, O, MS, CS> {
    row_actions: Vec<A>,
    col_actions: Vec<A>,
    stats: Mutex<MS>,
    edges: Box<[SyncChanceNode<A, O, MS, CS>]>,
}

/// Shared chance node: stats and the child map each behind their own mutex.
pub struct SyncChanceNode<A, O, MS, CS> {
    stats: Mutex<CS>,
    children: Mutex<FxHashMap<O, Arc<SyncMatrixNode<A, O, MS, CS>>>>,
}

impl<A, O, MS, CS> Default for SyncMatrixNode<A, O, MS, CS> {
    fn default() -> Self {
        Self {
            body: OnceLock::new(),
            terminal: AtomicBool::new(false),
        }
    }
}

impl<A, O, MS: Default, CS: Default> Default for SyncChanceNode<A, O, MS, CS> {
    fn default() -> Self {
        Self {
            stats: Mutex::new(CS::default()),
            children: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<A, O, MS, CS> SyncMatrixNode<A, O, MS, CS> {
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Relaxed)
    }

    pub fn is_expanded(&self) -> bool {
        self.body.get().is_some()
    }

    /// Read the node statistics under the lock; `None` before expansion.
    pub fn with_stats<T>(&self, read: impl FnOnce(&MS) -> T) -> Option<T> {
        self.body.get().map(|body| read(&body.stats.lock()))
    }

    pub fn count_matrix_nodes(&self) -> usize {
        let mut count = 1;
        if let Some(body) = self.body.get() {
            for chance in body.edges.iter() {
                let children = chance.children.lock();
                for child in children.values() {
                    count += child.count_matrix_nodes();
                }
            }
        }
        count
    }
}

/// Threaded counterpart of [`super::TreeBandit`].
#[derive(Debug, Clone)]
pub struct TreeBanditThreaded<B> {
    bandit: B,
    config: TreeBanditConfig,
}

impl<B> TreeBanditThreaded<B> {
    pub fn new(bandit: B) -> Self {
        Self {
            bandit,
            config: TreeBanditConfig::default(),
        }
    }

    pub fn with_config(bandit: B, config: TreeBanditConfig) -> Self {
        Self { bandit, config }
    }

    /// Split `iterations` across `threads` workers; returns elapsed ms.
    /// Worker seeds derive from `seed`, so a run is reproducible for a fixed
    /// thread count up to scheduling of the shared statistics.
    pub fn run_for_iterations<S, M>(
        &self,
        iterations: u64,
        threads: usize,
        seed: u64,
        state: &S,
        model: &M,
        root: &SyncMatrixNode<S::Action, S::Obs, B::MatrixStats, B::ChanceStats>,
    ) -> Result<u128, SearchError>
    where
        S: State + Sync,
        B: Bandit<S::Real>,
        B::MatrixStats: Sync,
        B::ChanceStats: Sync,
        M: Model<S> + Clone + Send + Sync,
    {
        let threads = threads.max(1) as u64;
        let start = Instant::now();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|worker| {
                    scope.spawn(move || -> Result<(), SearchError> {
                        let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(worker));
                        let mut model = model.clone();
                        let mut output = ModelOutput::default();
                        let share =
                            iterations / threads + u64::from(worker < iterations % threads);
                        for _ in 0..share {
                            let mut scratch = state.clone();
                            scratch.randomize_transition(rng.gen());
                            scratch.update_actions();
                            self.run_iteration(&mut rng, &mut scratch, &mut model, root, &mut output)?;
                        }
                        Ok(())
                    })
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(result) => result?,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok(())
        })?;
        Ok(start.elapsed().as_millis())
    }

    fn run_iteration<S, M, G>(
        &self,
        rng: &mut G,
        state: &mut S,
        model: &mut M,
        node: &SyncMatrixNode<S::Action, S::Obs, B::MatrixStats, B::ChanceStats>,
        output: &mut ModelOutput<S::Real>,
    ) -> Result<(), SearchError>
    where
        S: State,
        B: Bandit<S::Real>,
        M: Model<S>,
        G: Rng,
    {
        if state.is_terminal() {
            node.terminal.store(true, Ordering::Relaxed);
            output.value = state.payoff();
            return Ok(());
        }

        let rows = state.row_actions().len();
        let cols = state.col_actions().len();
        if rows == 0 {
            return Err(SearchError::EmptyActionSet { side: "row" });
        }
        if cols == 0 {
            return Err(SearchError::EmptyActionSet { side: "col" });
        }

        let mut expanded_now = false;
        let body = node.body.get_or_init(|| {
            model.inference(state.clone(), output);
            let mut stats = B::MatrixStats::default();
            self.bandit.expand(rows, cols, output, &mut stats);
            expanded_now = true;
            NodeBody {
                row_actions: state.row_actions().to_vec(),
                col_actions: state.col_actions().to_vec(),
                stats: Mutex::new(stats),
                edges: (0..rows * cols).map(|_| SyncChanceNode::default()).collect(),
            }
        });
        if expanded_now {
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
            if self.config.return_after_expand {
                return Ok(());
            }
        }

        let mut outcome = {
            let stats = body.stats.lock();
            self.bandit.select(rng, &stats)
        };
        let row_action = body.row_actions[outcome.row_idx];
        let col_action = body.col_actions[outcome.col_idx];
        state.apply_actions(row_action, col_action);
        state.update_actions();

        let chance = &body.edges[outcome.row_idx * body.col_actions.len() + outcome.col_idx];
        let child = {
            let mut children = chance.children.lock();
            Arc::clone(
                children
                    .entry(state.obs())
                    .or_insert_with(|| Arc::new(SyncMatrixNode::default())),
            )
        };
        self.run_iteration(rng, state, model, &child, output)?;

        outcome.value = match self.config.backprop {
            Backprop::Leaf => output.value,
            Backprop::NodeAverage => child
                .with_stats(|stats| self.bandit.empirical_value(stats))
                .unwrap_or(output.value),
        };
        {
            let mut chance_stats = chance.stats.lock();
            self.bandit.update_chance_stats(&mut chance_stats, &outcome);
        }
        {
            let mut stats = body.stats.lock();
            self.bandit.update_matrix_stats(&mut stats, &outcome);
        }
        Ok(())
    }
}
