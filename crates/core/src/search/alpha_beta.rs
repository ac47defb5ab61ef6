//! Simultaneous-move alpha-beta with double oracle, for states whose chance
//! support is enumerable.
//!
//! Each node keeps restricted action supports `I`, `J` together with
//! pessimistic and optimistic bound matrices over the full action sets. The
//! main loop resolves every unsolved support cell by recursing over its
//! chance outcomes, solves the restricted sub-game, then asks both players
//! for a best response against the equilibrium strategies; responses join
//! the supports and tighten the `(α, β)` window until the two meet. A side
//! with no response at least as good as its bound prunes the node to
//! `min_val`/`max_val`.

use crate::error::SearchError;
use crate::game::EnumerableChance;
use crate::model::{Model, ModelOutput};
use crate::nash::MatrixSolver;
use crate::num::{Matrix, Prob, Scalar, Value};
use crate::tree::{ChanceNodeOps, MatrixNodeOps};

#[derive(Debug, Clone, Default)]
pub struct AlphaBetaMatrixStats<R: Scalar> {
    /// Value of this node for the row player once solved.
    pub row_value: R,
    /// Lower bounds on every cell, over the full action sets.
    pub pessimistic: Matrix<R>,
    /// Upper bounds on every cell, over the full action sets.
    pub optimistic: Matrix<R>,
    /// Restricted row support `I`.
    pub row_support: Vec<usize>,
    /// Restricted column support `J`.
    pub col_support: Vec<usize>,
    /// Equilibrium of the last restricted sub-game, in support order.
    pub row_solution: Vec<R>,
    pub col_solution: Vec<R>,
    pub row_br_idx: Option<usize>,
    pub col_br_idx: Option<usize>,
    /// Chance outcomes resolved per cell.
    pub chance_solved: Matrix<u32>,
    pub depth: usize,
    pub prob: Prob<R>,
}

#[derive(Debug, Clone, Default)]
pub struct AlphaBetaChanceStats<R: Scalar> {
    /// Probability mass of the outcomes explored below this edge.
    pub explored: Prob<R>,
}

/// Double-oracle alpha-beta over enumerable-chance states.
#[derive(Debug, Clone)]
pub struct AlphaBeta<R: Scalar, V> {
    min_val: R,
    max_val: R,
    solver: V,
}

impl<R: Scalar, V> AlphaBeta<R, V> {
    /// Solver with the conventional `[0, 1]` payoff window.
    pub fn new(solver: V) -> Self {
        Self {
            min_val: R::zero(),
            max_val: R::one(),
            solver,
        }
    }

    pub fn with_bounds(min_val: R, max_val: R, solver: V) -> Self {
        Self {
            min_val,
            max_val,
            solver,
        }
    }

    /// Solve `state` to `max_depth`. Returns `(α, β)`, equal on completion.
    pub fn run<S, M, MN>(
        &self,
        max_depth: usize,
        state: &S,
        model: &mut M,
        root: &mut MN,
    ) -> Result<(R, R), SearchError>
    where
        S: EnumerableChance<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = AlphaBetaMatrixStats<R>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = AlphaBetaChanceStats<R>>,
    {
        let mut scratch = state.clone();
        let value =
            self.double_oracle(max_depth, &mut scratch, model, root, self.min_val, self.max_val)?;
        Ok((value, value))
    }

    fn double_oracle<S, M, MN>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
        mut alpha: R,
        mut beta: R,
    ) -> Result<R, SearchError>
    where
        S: EnumerableChance<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = AlphaBetaMatrixStats<R>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = AlphaBetaChanceStats<R>>,
    {
        state.update_actions();
        node.expand(state.row_actions(), state.col_actions());
        node.stats_mut().prob = state.prob();

        if state.is_terminal() {
            let value = state.payoff().row();
            node.stats_mut().row_value = value;
            node.set_terminal();
            return Ok(value);
        }
        if node.stats().depth >= max_depth {
            let mut output = ModelOutput::default();
            model.inference(state.clone(), &mut output);
            let value = output.value.row();
            node.stats_mut().row_value = value;
            node.set_terminal();
            return Ok(value);
        }

        let rows = node.rows();
        let cols = node.cols();
        if rows == 0 {
            return Err(SearchError::EmptyActionSet { side: "row" });
        }
        if cols == 0 {
            return Err(SearchError::EmptyActionSet { side: "col" });
        }

        {
            // Seed both supports with the principal action and reset the
            // bound matrices to the full window.
            let stats = node.stats_mut();
            stats.row_support.clear();
            stats.row_support.push(0);
            stats.col_support.clear();
            stats.col_support.push(0);
            stats.pessimistic = Matrix::filled(rows, cols, self.min_val);
            stats.optimistic = Matrix::filled(rows, cols, self.max_val);
            stats.chance_solved = Matrix::filled(rows, cols, 0);
            stats.row_value = alpha;
        }

        while !alpha.fuzzy_eq(beta) {
            let support_i = node.stats().row_support.clone();
            let support_j = node.stats().col_support.clone();
            for &row_idx in &support_i {
                for &col_idx in &support_j {
                    let p_ij = *node.stats().pessimistic.get(row_idx, col_idx);
                    let o_ij = *node.stats().optimistic.get(row_idx, col_idx);
                    if p_ij < o_ij {
                        let value =
                            self.resolve_cell(max_depth, state, model, node, row_idx, col_idx, p_ij, o_ij)?;
                        let stats = node.stats_mut();
                        *stats.pessimistic.get_mut(row_idx, col_idx) = value;
                        *stats.optimistic.get_mut(row_idx, col_idx) = value;
                    }
                }
            }

            let (row_strategy, col_strategy, value) = self.solve_submatrix(node)?;
            let (row_br, v_max) =
                self.best_response_row(max_depth, state, model, node, alpha, &col_strategy)?;
            let (col_br, v_min) =
                self.best_response_col(max_depth, state, model, node, beta, &row_strategy)?;
            {
                let stats = node.stats_mut();
                stats.row_br_idx = row_br;
                stats.col_br_idx = col_br;
                stats.row_solution = row_strategy;
                stats.col_solution = col_strategy;
                stats.row_value = value;
            }

            let Some(row_br) = row_br else {
                node.stats_mut().row_value = self.min_val;
                return Ok(self.min_val);
            };
            let Some(col_br) = col_br else {
                node.stats_mut().row_value = self.max_val;
                return Ok(self.max_val);
            };

            alpha = alpha.max(v_min).canonicalized();
            beta = beta.min(v_max).canonicalized();

            let stats = node.stats_mut();
            if !stats.row_support.contains(&row_br) {
                stats.row_support.push(row_br);
            }
            if !stats.col_support.contains(&col_br) {
                stats.col_support.push(col_br);
            }
            stats.row_value = alpha;
        }

        Ok(node.stats().row_value)
    }

    /// Resolve one cell exactly: recurse over every chance outcome with the
    /// cell's current bounds and return the probability-weighted value.
    #[allow(clippy::too_many_arguments)]
    fn resolve_cell<S, M, MN>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
        row_idx: usize,
        col_idx: usize,
        p_ij: R,
        o_ij: R,
    ) -> Result<R, SearchError>
    where
        S: EnumerableChance<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = AlphaBetaMatrixStats<R>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = AlphaBetaChanceStats<R>>,
    {
        let row_action = node.row_actions()[row_idx];
        let col_action = node.col_actions()[col_idx];
        let depth = node.stats().depth;
        let chance_actions = state.chance_actions(row_action, col_action);

        let mut value = R::zero();
        {
            let chance = node.access(row_idx, col_idx);
            for chance_action in &chance_actions {
                let mut next_state = state.clone();
                next_state.apply_actions_with_chance(row_action, col_action, chance_action);
                let prob = next_state.prob();

                let child = chance.access(&next_state.obs());
                child.stats_mut().depth = depth + 1;
                let child_value =
                    self.double_oracle(max_depth, &mut next_state, model, child, p_ij, o_ij)?;
                value += prob * child_value;
                chance.stats_mut().explored += prob;
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            *node.stats_mut().chance_solved.get_mut(row_idx, col_idx) +=
                chance_actions.len() as u32;
        }
        Ok(value.canonicalized())
    }

    fn solve_submatrix<MN, A, O>(&self, node: &MN) -> Result<(Vec<R>, Vec<R>, R), SearchError>
    where
        A: Copy + PartialEq + std::fmt::Debug + Send + Sync,
        O: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<A, O, Stats = AlphaBetaMatrixStats<R>>,
    {
        let stats = node.stats();
        let submatrix = Matrix::from_fn(
            stats.row_support.len(),
            stats.col_support.len(),
            |a, b| {
                // Cells of the restricted game are solved, so either bound works.
                Value::new(*stats.pessimistic.get(stats.row_support[a], stats.col_support[b]))
            },
        );
        let mut row_strategy = Vec::new();
        let mut col_strategy = Vec::new();
        let value = self
            .solver
            .solve(&submatrix, &mut row_strategy, &mut col_strategy)?;
        Ok((row_strategy, col_strategy, value))
    }

    /// Best response for the row player against `col_strategy`.
    ///
    /// A candidate row is skipped as soon as some unsolved cell would need a
    /// pessimistic value above its optimistic bound to beat the incumbent;
    /// otherwise its unsolved cells are resolved and the expected payoff
    /// compared, accepting fuzzy ties when no winner exists yet.
    fn best_response_row<S, M, MN>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
        alpha: R,
        col_strategy: &[R],
    ) -> Result<(Option<usize>, R), SearchError>
    where
        S: EnumerableChance<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = AlphaBetaMatrixStats<R>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = AlphaBetaChanceStats<R>>,
    {
        let rows = node.rows();
        let support_j = node.stats().col_support.clone();
        let mut best_response = alpha;
        let mut best_idx: Option<usize> = None;

        for row_idx in 0..rows {
            let mut expected_optimistic = R::zero();
            for (j, &col_idx) in support_j.iter().enumerate() {
                expected_optimistic +=
                    col_strategy[j] * *node.stats().optimistic.get(row_idx, col_idx);
            }

            let mut skip_row = false;
            for (j, &col_idx) in support_j.iter().enumerate() {
                let y = col_strategy[j];
                let p_ij = *node.stats().pessimistic.get(row_idx, col_idx);
                let o_ij = *node.stats().optimistic.get(row_idx, col_idx);
                if y > R::zero() && p_ij < o_ij {
                    let required = (best_response - expected_optimistic + y * o_ij) / y;
                    if required.max(p_ij) > o_ij {
                        skip_row = true;
                        break;
                    }
                    let value =
                        self.resolve_cell(max_depth, state, model, node, row_idx, col_idx, p_ij, o_ij)?;
                    let stats = node.stats_mut();
                    *stats.pessimistic.get_mut(row_idx, col_idx) = value;
                    *stats.optimistic.get_mut(row_idx, col_idx) = value;
                }
            }
            if skip_row {
                continue;
            }

            let mut expected = R::zero();
            for (j, &col_idx) in support_j.iter().enumerate() {
                expected += col_strategy[j] * *node.stats().optimistic.get(row_idx, col_idx);
            }
            expected = expected.canonicalized();
            if expected >= best_response
                || (best_idx.is_none() && expected.fuzzy_eq(best_response))
            {
                best_idx = Some(row_idx);
                best_response = expected;
            }
        }
        Ok((best_idx, best_response))
    }

    /// Best response for the column player against `row_strategy`; mirror of
    /// [`Self::best_response_row`] on the pessimistic bounds.
    fn best_response_col<S, M, MN>(
        &self,
        max_depth: usize,
        state: &mut S,
        model: &mut M,
        node: &mut MN,
        beta: R,
        row_strategy: &[R],
    ) -> Result<(Option<usize>, R), SearchError>
    where
        S: EnumerableChance<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        MN: MatrixNodeOps<S::Action, S::Obs, Stats = AlphaBetaMatrixStats<R>>,
        MN::Chance: ChanceNodeOps<S::Action, S::Obs, Stats = AlphaBetaChanceStats<R>>,
    {
        let cols = node.cols();
        let support_i = node.stats().row_support.clone();
        let mut best_response = beta;
        let mut best_idx: Option<usize> = None;

        for col_idx in 0..cols {
            let mut expected_pessimistic = R::zero();
            for (i, &row_idx) in support_i.iter().enumerate() {
                expected_pessimistic +=
                    row_strategy[i] * *node.stats().pessimistic.get(row_idx, col_idx);
            }

            let mut skip_col = false;
            for (i, &row_idx) in support_i.iter().enumerate() {
                let x = row_strategy[i];
                let p_ij = *node.stats().pessimistic.get(row_idx, col_idx);
                let o_ij = *node.stats().optimistic.get(row_idx, col_idx);
                if x > R::zero() && p_ij < o_ij {
                    let required = (best_response - expected_pessimistic + x * p_ij) / x;
                    if required.min(o_ij) < p_ij {
                        skip_col = true;
                        break;
                    }
                    let value =
                        self.resolve_cell(max_depth, state, model, node, row_idx, col_idx, p_ij, o_ij)?;
                    let stats = node.stats_mut();
                    *stats.pessimistic.get_mut(row_idx, col_idx) = value;
                    *stats.optimistic.get_mut(row_idx, col_idx) = value;
                }
            }
            if skip_col {
                continue;
            }

            let mut expected = R::zero();
            for (i, &row_idx) in support_i.iter().enumerate() {
                expected += row_strategy[i] * *node.stats().pessimistic.get(row_idx, col_idx);
            }
            expected = expected.canonicalized();
            if expected <= best_response
                || (best_idx.is_none() && expected.fuzzy_eq(best_response))
            {
                best_idx = Some(col_idx);
                best_response = expected;
            }
        }
        Ok((best_idx, best_response))
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
        dense::MatrixNode<u8, O, AlphaBetaMatrixStats<R>, AlphaBetaChanceStats<R>>;

    #[timed_test]
    fn matching_pennies_converges_to_one_half() {
        let state: MatrixGameState<Rational> = MatrixGameState::matching_pennies();
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (alpha, beta) = search.run(2, &state, &mut model, &mut root).unwrap();
        assert_eq!(alpha, Rational::new(1, 2));
        assert_eq!(beta, Rational::new(1, 2));
    }

    #[timed_test]
    fn known_value_is_exact_in_rational_mode() {
        // Diagonal game with value 7/12.
        let state: MatrixGameState<Rational> =
            MatrixGameState::from_fractions(&[&[(5, 6), (1, 3)], &[(1, 3), (5, 6)]]);
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (alpha, beta) = search.run(2, &state, &mut model, &mut root).unwrap();
        assert_eq!(alpha, Rational::new(7, 12));
        assert_eq!(beta, Rational::new(7, 12));
    }

    #[timed_test]
    fn support_cells_end_solved() {
        let state: MatrixGameState<Rational> = MatrixGameState::matching_pennies();
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        search.run(2, &state, &mut model, &mut root).unwrap();

        let stats = root.stats();
        for &i in &stats.row_support {
            for &j in &stats.col_support {
                assert_eq!(stats.pessimistic.get(i, j), stats.optimistic.get(i, j));
            }
        }
        // The returned value is the equilibrium value of the solved support.
        let submatrix = Matrix::from_fn(
            stats.row_support.len(),
            stats.col_support.len(),
            |a, b| Value::new(*stats.pessimistic.get(stats.row_support[a], stats.col_support[b])),
        );
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&submatrix, &mut x, &mut y).unwrap();
        assert_eq!(value, stats.row_value);
    }

    #[timed_test]
    fn saddle_point_needs_no_mixing() {
        // Row 1 strictly dominates; the saddle is (1, 0) with value 3/4.
        let state: MatrixGameState<Rational> =
            MatrixGameState::from_fractions(&[&[(1, 4), (1, 2)], &[(3, 4), (1, 1)]]);
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (alpha, beta) = search.run(2, &state, &mut model, &mut root).unwrap();
        assert_eq!(alpha, Rational::new(3, 4));
        assert_eq!(beta, Rational::new(3, 4));
    }

    #[timed_test]
    fn depth_cutoff_consults_the_model() {
        let state: MoldState<f64> = MoldState::new(2, 4);
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(1);
        let mut root: Root<f64, u8> = dense::MatrixNode::default();
        let (alpha, beta) = search.run(0, &state, &mut model, &mut root).unwrap();
        assert!((alpha - 0.0).abs() < 1e-12);
        assert!((beta - 0.0).abs() < 1e-12);
        assert!(root.is_terminal());
    }

    #[timed_test]
    fn two_level_mold_solves_to_zero() {
        let state: MoldState<Rational> = MoldState::new(2, 2);
        let search = AlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut root: Root<Rational, u8> = dense::MatrixNode::default();
        let (alpha, beta) = search.run(4, &state, &mut model, &mut root).unwrap();
        assert_eq!(alpha, Rational::new(0, 1));
        assert_eq!(beta, Rational::new(0, 1));
    }
}
