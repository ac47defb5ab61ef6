//! Full traversal: exhaustive expansion with per-node matrix-game solving.
//!
//! The tree produced is one-to-one with the abstract game tree. Every cell
//! of every matrix node is resolved by enumerating its chance outcomes and
//! recursing; the node's payoff matrix is then handed to the matrix-game
//! solver. Deterministic: two runs over the same state build identical
//! trees.
//!
//! The threaded variant shares one tree between workers. Each chance node
//! carries a work mutex that a worker `try_lock`s, skipping on contention so
//! the workers steal cells from each other; a second blocking pass
//! guarantees every cell is complete before the node-level solve, which is
//! performed by whichever worker finishes the last cell. Lock acquisition is
//! strictly parent-to-child, so the passes cannot deadlock.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use crate::error::SearchError;
use crate::game::{EnumerableChance, State};
use crate::model::{Model, ModelOutput};
use crate::nash::MatrixSolver;
use crate::num::{Matrix, Prob, Scalar, Value};
use crate::tree::{ChanceNodeOps, MatrixNodeOps};

/// Per-matrix-node statistics of the single-threaded traversal.
#[derive(Debug, Clone, Default)]
pub struct TraversalMatrixStats<R: Scalar> {
    pub payoff: Value<R>,
    pub row_solution: Vec<R>,
    pub col_solution: Vec<R>,
    pub nash_payoff_matrix: Matrix<Value<R>>,
    pub depth: usize,
    pub prob: Prob<R>,
}

/// Per-chance-node statistics: the enumerated support and its probabilities.
#[derive(Debug, Clone)]
pub struct TraversalChanceStats<R: Scalar, O> {
    pub chance_actions: Vec<O>,
    pub chance_probs: Vec<Prob<R>>,
}

impl<R: Scalar, O> Default for TraversalChanceStats<R, O> {
    fn default() -> Self {
        Self {
            chance_actions: Vec::new(),
            chance_probs: Vec::new(),
        }
    }
}

/// Exhaustive depth-limited solver over enumerable-chance states.
#[derive(Debug, Clone)]
pub struct FullTraversal<V> {
    solver: V,
}

impl<V> FullTraversal<V> {
    pub fn new(solver: V) -> Self {
        Self { solver }
    }

    /// Solve the game below `state` to `max_depth`, recording the tree under
    /// `root`. Returns the root value for both players' bookkeeping.
    pub fn run<S, M, MN>(
        &self,
        max_depth: usize,
        state: &S,
        model: &mut M,
        root: &mut MN,
    ) -> Result<(S::Real, S::Real), SearchError>
    where
        S: EnumerableChance,
        M: Model<S>,
        V: MatrixSolver<S::Real>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = TraversalMatrixStats<S::Real>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = TraversalChanceStats<S::Real, S::Obs>>,
    {
        let mut scratch = state.clone();
        self.solve_node(max_depth, &mut scratch, model, root)?;
        let value = root.stats().payoff.row();
        Ok((value, value))
    }

    fn solve_node<S, M, MN>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
    ) -> Result<(), SearchError>
    where
        S: EnumerableChance,
        M: Model<S>,
        V: MatrixSolver<S::Real>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = TraversalMatrixStats<S::Real>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = TraversalChanceStats<S::Real, S::Obs>>,
    {
        state.update_actions();
        node.expand(state.row_actions(), state.col_actions());
        node.stats_mut().prob = state.prob();

        if state.is_terminal() {
            node.stats_mut().payoff = state.payoff();
            node.set_terminal();
            return Ok(());
        }
        if node.stats().depth >= max_depth {
            let mut output = ModelOutput::default();
            model.inference(state.clone(), &mut output);
            node.stats_mut().payoff = output.value;
            node.set_terminal();
            return Ok(());
        }

        let rows = node.rows();
        let cols = node.cols();
        if rows == 0 {
            return Err(SearchError::EmptyActionSet { side: "row" });
        }
        if cols == 0 {
            return Err(SearchError::EmptyActionSet { side: "col" });
        }
        node.stats_mut().nash_payoff_matrix = Matrix::filled(rows, cols, Value::default());
        let depth = node.stats().depth;

        for row_idx in 0..rows {
            for col_idx in 0..cols {
                let row_action = node.row_actions()[row_idx];
                let col_action = node.col_actions()[col_idx];
                let chance_actions = state.chance_actions(row_action, col_action);

                let mut cell_value = Value::default();
                let chance = node.access(row_idx, col_idx);
                chance.stats_mut().chance_actions = chance_actions.clone();
                for chance_action in &chance_actions {
                    let mut next_state = state.clone();
                    next_state.apply_actions_with_chance(row_action, col_action, chance_action);
                    let prob = next_state.prob();
                    chance.stats_mut().chance_probs.push(prob);

                    let child = chance.access(&next_state.obs());
                    child.stats_mut().depth = depth + 1;
                    self.solve_node(max_depth, &mut next_state, model, child)?;
                    cell_value += child.stats().payoff * prob;
                }
                *node.stats_mut().nash_payoff_matrix.get_mut(row_idx, col_idx) = cell_value;
            }
        }

        let mut row_solution = Vec::new();
        let mut col_solution = Vec::new();
        let value = self
            .solver
            .solve(&node.stats().nash_payoff_matrix, &mut row_solution, &mut col_solution)?;
        let stats = node.stats_mut();
        stats.payoff = Value::new(value.canonicalized());
        stats.row_solution = row_solution;
        stats.col_solution = col_solution;
        Ok(())
    }

    /// Threaded traversal over a shared tree. `threads` workers race down
    /// the cells; the result is identical to [`FullTraversal::run`].
    pub fn run_threaded<S, M>(
        &self,
        max_depth: usize,
        state: &S,
        model: &M,
        root: &SharedMatrixNode<S>,
        threads: usize,
    ) -> Result<(S::Real, S::Real), SearchError>
    where
        S: EnumerableChance + Sync,
        M: Model<S> + Clone + Send + Sync,
        V: MatrixSolver<S::Real> + Sync,
    {
        let threads = threads.max(1);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(move || {
                        let mut scratch = state.clone();
                        let mut model = model.clone();
                        self.solve_shared(max_depth, &mut scratch, &mut model, root, 0)
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
        let result = root.result.lock();
        Ok((result.payoff.row(), result.payoff.row()))
    }

    fn solve_shared<S, M>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &SharedMatrixNode<S>,
        depth: usize,
    ) -> Result<(), SearchError>
    where
        S: EnumerableChance,
        M: Model<S>,
        V: MatrixSolver<S::Real>,
    {
        state.update_actions();

        if state.is_terminal() {
            let mut result = node.result.lock();
            if !result.solved {
                result.payoff = state.payoff();
                result.solved = true;
            }
            return Ok(());
        }
        if depth >= max_depth {
            if node.result.lock().solved {
                return Ok(());
            }
            let mut output = ModelOutput::default();
            model.inference(state.clone(), &mut output);
            let mut result = node.result.lock();
            if !result.solved {
                result.payoff = output.value;
                result.solved = true;
            }
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
        let meta = node.meta.get_or_init(|| SharedMeta {
            row_actions: state.row_actions().to_vec(),
            col_actions: state.col_actions().to_vec(),
            edges: (0..rows * cols).map(|_| SharedChanceNode::default()).collect(),
        });

        // First pass steals whatever cells are free; the second waits out
        // any cell still being worked by another thread.
        for blocking in [false, true] {
            for row_idx in 0..rows {
                for col_idx in 0..cols {
                    self.process_shared_cell(
                        max_depth, state, model, node, meta, row_idx, col_idx, depth, blocking,
                    )?;
                }
            }
        }

        let mut result = node.result.lock();
        if !result.solved && result.cells_solved == rows * cols {
            let mut row_solution = Vec::new();
            let mut col_solution = Vec::new();
            let value = self
                .solver
                .solve(&result.nash, &mut row_solution, &mut col_solution)?;
            result.payoff = Value::new(value.canonicalized());
            result.row_solution = row_solution;
            result.col_solution = col_solution;
            result.solved = true;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_shared_cell<S, M>(
        &self,
        max_depth: usize,
        state: &S,
        model: &mut M,
        node: &SharedMatrixNode<S>,
        meta: &SharedMeta<S>,
        row_idx: usize,
        col_idx: usize,
        depth: usize,
        blocking: bool,
    ) -> Result<(), SearchError>
    where
        S: EnumerableChance,
        M: Model<S>,
        V: MatrixSolver<S::Real>,
    {
        let chance = &meta.edges[row_idx * meta.col_actions.len() + col_idx];
        let mut work = if blocking {
            chance.work.lock()
        } else {
            match chance.work.try_lock() {
                Some(guard) => guard,
                None => return Ok(()),
            }
        };
        if work.solved {
            return Ok(());
        }

        let row_action = meta.row_actions[row_idx];
        let col_action = meta.col_actions[col_idx];
        work.chance_actions = state.chance_actions(row_action, col_action);
        let chance_actions = work.chance_actions.clone();

        let mut cell_value = Value::default();
        for chance_action in &chance_actions {
            let mut next_state = state.clone();
            next_state.apply_actions_with_chance(row_action, col_action, chance_action);
            let prob = next_state.prob();
            work.chance_probs.push(prob);

            let child = work
                .children
                .entry(next_state.obs())
                .or_insert_with(|| Box::new(SharedMatrixNode::default()));
            self.solve_shared(max_depth, &mut next_state, model, child, depth + 1)?;
            let payoff = child.result.lock().payoff;
            cell_value += payoff * prob;
        }
        work.cell_value = cell_value;
        work.solved = true;
        drop(work);

        let mut result = node.result.lock();
        if result.nash.is_empty() {
            result.nash = Matrix::filled(
                meta.row_actions.len(),
                meta.col_actions.len(),
                Value::default(),
            );
        }
        *result.nash.get_mut(row_idx, col_idx) = cell_value;
        result.cells_solved += 1;
        Ok(())
    }
}

/// Matrix node of the shared (threaded) tree. Expansion publishes once;
/// results live behind a per-node lock.
pub struct SharedMatrixNode<S: State> {
    meta: OnceLock<SharedMeta<S>>,
    result: Mutex<NodeResult<S::Real>>,
}

struct SharedMeta<S: State> {
    row_actions: Vec<S::Action>,
    col_actions: Vec<S::Action>,
    edges: Box<[SharedChanceNode<S>]>,
}

#[derive(Default)]
struct NodeResult<R: Scalar> {
    payoff: Value<R>,
    row_solution: Vec<R>,
    col_solution: Vec<R>,
    nash: Matrix<Value<R>>,
    cells_solved: usize,
    solved: bool,
}

/// Chance node of the shared tree: all cell work happens under one mutex.
pub struct SharedChanceNode<S: State> {
    work: Mutex<ChanceWork<S>>,
}

struct ChanceWork<S: State> {
    solved: bool,
    chance_actions: Vec<S::Obs>,
    chance_probs: Vec<Prob<S::Real>>,
    cell_value: Value<S::Real>,
    children: FxHashMap<S::Obs, Box<SharedMatrixNode<S>>>,
}

impl<S: State> Default for SharedMatrixNode<S> {
    fn default() -> Self {
        Self {
            meta: OnceLock::new(),
            result: Mutex::new(NodeResult::default()),
        }
    }
}

impl<S: State> Default for SharedChanceNode<S> {
    fn default() -> Self {
        Self {
            work: Mutex::new(ChanceWork {
                solved: false,
                chance_actions: Vec::new(),
                chance_probs: Vec::new(),
                cell_value: Value::default(),
                children: FxHashMap::default(),
            }),
        }
    }
}

impl<S: State> SharedMatrixNode<S> {
    pub fn payoff(&self) -> Value<S::Real> {
        self.result.lock().payoff
    }

    pub fn row_solution(&self) -> Vec<S::Real> {
        self.result.lock().row_solution.clone()
    }

    pub fn col_solution(&self) -> Vec<S::Real> {
        self.result.lock().col_solution.clone()
    }

    pub fn count_matrix_nodes(&self) -> usize {
        let mut count = 1;
        if let Some(meta) = self.meta.get() {
            for chance in meta.edges.iter() {
                let work = chance.work.lock();
                for child in work.children.values() {
                    count += child.count_matrix_nodes();
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MatrixGameState, MoldState};
    use crate::model::MonteCarloModel;
    use crate::nash::SupportEnumeration;
    use crate::num::Rational;
    use crate::tree::{dense, MatrixNodeOps};
    use test_macros::timed_test;

    type Root<R, O> =
        dense::MatrixNode<u8, O, TraversalMatrixStats<R>, TraversalChanceStats<R, O>>;

    #[timed_test]
    fn single_cell_game_is_solved_exactly() {
        let state: MatrixGameState<f64> =
            MatrixGameState::single(Value::new(0.5));
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<f64, u8> = dense::MatrixNode::default();
        let (value, _) = search.run(1, &state, &mut model, &mut root).unwrap();
        assert!((value - 0.5).abs() < 1e-12);
        assert_eq!(root.count_matrix_nodes(), 2);
        assert_eq!(root.stats().row_solution, vec![1.0]);
        assert_eq!(root.stats().col_solution, vec![1.0]);
    }

    #[timed_test]
    fn matching_pennies_mixes_evenly() {
        let state: MatrixGameState<Rational> = MatrixGameState::matching_pennies();
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (value, _) = search.run(1, &state, &mut model, &mut root).unwrap();
        assert_eq!(value, Rational::new(1, 2));
        assert_eq!(
            root.stats().row_solution,
            vec![Rational::new(1, 2), Rational::new(1, 2)]
        );
        assert_eq!(
            root.stats().col_solution,
            vec![Rational::new(1, 2), Rational::new(1, 2)]
        );
    }

    #[timed_test]
    fn mold_tree_has_ninety_one_nodes() {
        let state: MoldState<Rational> = MoldState::new(3, 2);
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (value, _) = search.run(3, &state, &mut model, &mut root).unwrap();
        assert_eq!(value, Rational::new(0, 1));
        assert_eq!(root.count_matrix_nodes(), 91);
    }

    #[timed_test]
    fn zero_depth_consults_the_model_without_children() {
        let state: MoldState<f64> = MoldState::new(2, 3);
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<f64, u8> = dense::MatrixNode::default();
        let (value, _) = search.run(0, &state, &mut model, &mut root).unwrap();
        // The rollout model always reaches a zero-payoff mold leaf.
        assert!((value - 0.0).abs() < 1e-12);
        assert_eq!(root.count_matrix_nodes(), 1);
        assert!(root.is_terminal());
    }

    #[timed_test]
    fn traversal_is_deterministic() {
        let state: MoldState<Rational> = MoldState::new(2, 2);
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);

        let mut first: Root<Rational, u8> = dense::MatrixNode::default();
        let mut second: Root<Rational, u8> = dense::MatrixNode::default();
        search.run(5, &state, &mut model, &mut first).unwrap();
        search.run(5, &state, &mut model, &mut second).unwrap();

        assert_eq!(first.stats().payoff, second.stats().payoff);
        assert_eq!(first.stats().row_solution, second.stats().row_solution);
        assert_eq!(first.count_matrix_nodes(), second.count_matrix_nodes());
    }

    #[timed_test]
    fn threaded_matches_single_threaded() {
        let state: MoldState<Rational> = MoldState::new(3, 2);
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);

        let mut serial: Root<Rational, u8> = dense::MatrixNode::default();
        let (serial_value, _) = search.run(3, &state, &mut model, &mut serial).unwrap();

        let shared = SharedMatrixNode::default();
        let (threaded_value, _) = search
            .run_threaded(3, &state, &MonteCarloModel::new(0), &shared, 4)
            .unwrap();

        assert_eq!(serial_value, threaded_value);
        assert_eq!(shared.count_matrix_nodes(), 91);
        assert_eq!(shared.row_solution(), serial.stats().row_solution);
    }
}
