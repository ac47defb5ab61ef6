//! Simultaneous-move alpha-beta with double oracle over sampled chance.
//!
//! Used when the chance support cannot be enumerated. Each cell of a node
//! keeps the mass it has already resolved (`alpha_explored`/`beta_explored`),
//! the residual `unexplored` mass, a `tries` counter and the discovered
//! branches keyed by observation. Exploration draws a 64-bit seed, reseeds a
//! state clone, applies the joint action and inserts a branch only when the
//! observation is novel; the residual mass is valued pessimistically at
//! `min_val` and optimistically at `max_val` wherever a cell is inexact.
//!
//! The per-cell budget is `min_tries`/`max_tries`/`max_unexplored`: sampling
//! stops once the residual is small enough and the minimum effort was spent,
//! or the try budget is exhausted, in which case the cell keeps its residual
//! interval. Exploration failure is signalled by "no new branch produced".

use rand::Rng;
use rustc_hash::FxHashMap;
use std::time::Instant;

use crate::error::SearchError;
use crate::game::State;
use crate::model::{Model, ModelOutput};
use crate::nash::MatrixSolver;
use crate::num::{Matrix, Prob, Scalar, Value};

/// Budget and policy switches of the sampled solver.
#[derive(Debug, Clone)]
pub struct SampledAlphaBetaConfig<R: Scalar> {
    pub min_val: R,
    pub max_val: R,
    /// Samples spent on a cell even after the residual is small enough.
    pub min_tries: u32,
    /// Hard cap on samples per cell.
    pub max_tries: u32,
    /// Residual mass below which a cell counts as explored.
    pub max_unexplored: Prob<R>,
    /// Keep the cached principal indices across `run` calls; otherwise every
    /// run re-seeds the supports with action 0.
    pub retain_principal: bool,
    /// Clamp the float-mode residual mass at zero when subtraction drifts
    /// negative. Exact mode never needs the clamp.
    pub clamp_unexplored: bool,
}

impl<R: Scalar> Default for SampledAlphaBetaConfig<R> {
    fn default() -> Self {
        Self {
            min_val: R::zero(),
            max_val: R::one(),
            min_tries: 0,
            max_tries: 1 << 6,
            max_unexplored: Prob::zero(),
            retain_principal: true,
            clamp_unexplored: true,
        }
    }
}

/// One sampled chance outcome below a cell.
pub struct Branch<S: State> {
    pub prob: Prob<S::Real>,
    pub seed: u64,
    pub node: Box<SampledNode<S>>,
}

/// Per-cell exploration state.
pub struct CellData<S: State> {
    pub unexplored: Prob<S::Real>,
    pub alpha_explored: S::Real,
    pub beta_explored: S::Real,
    pub tries: u32,
    pub branches: FxHashMap<S::Obs, Branch<S>>,
}

impl<S: State> Default for CellData<S> {
    fn default() -> Self {
        Self {
            unexplored: Prob::one(),
            alpha_explored: <S::Real as Scalar>::zero(),
            beta_explored: <S::Real as Scalar>::zero(),
            tries: 0,
            branches: FxHashMap::default(),
        }
    }
}

impl<S: State> CellData<S> {
    /// A cell is exact once its bounds met and no residual mass remains.
    pub fn solved_exactly(&self) -> bool {
        self.alpha_explored == self.beta_explored && self.unexplored == Prob::zero()
    }
}

/// Matrix node of the sampled solver; owns its cells and their branches.
pub struct SampledNode<S: State> {
    pub cells: Matrix<CellData<S>>,
    /// Equilibrium strategies padded to the full action sets after a run.
    pub row_solution: Vec<S::Real>,
    pub col_solution: Vec<S::Real>,
    pub row_support: Vec<usize>,
    pub col_support: Vec<usize>,
    /// Support seeds for the next visit: the most probable actions found.
    pub row_principal: usize,
    pub col_principal: usize,
    pub alpha: S::Real,
    pub beta: S::Real,
    pub depth: usize,
}

impl<S: State> Default for SampledNode<S> {
    fn default() -> Self {
        Self {
            cells: Matrix::default(),
            row_solution: Vec::new(),
            col_solution: Vec::new(),
            row_support: Vec::new(),
            col_support: Vec::new(),
            row_principal: 0,
            col_principal: 0,
            alpha: <S::Real as Scalar>::zero(),
            beta: <S::Real as Scalar>::zero(),
            depth: 0,
        }
    }
}

impl<S: State> SampledNode<S> {
    pub fn count_matrix_nodes(&self) -> usize {
        1 + self
            .cells
            .iter()
            .flat_map(|cell| cell.branches.values())
            .map(|branch| branch.node.count_matrix_nodes())
            .sum::<usize>()
    }
}

/// Per-depth record of an iterative-deepening run.
#[derive(Debug, Clone)]
pub struct DepthReport<R: Scalar> {
    pub depth: usize,
    pub alpha: R,
    pub beta: R,
    pub matrix_nodes: usize,
    pub elapsed_ms: u128,
}

/// Double-oracle alpha-beta over sampled chance.
#[derive(Debug, Clone)]
pub struct SampledAlphaBeta<R: Scalar, V> {
    config: SampledAlphaBetaConfig<R>,
    solver: V,
}

impl<R: Scalar, V> SampledAlphaBeta<R, V> {
    pub fn new(solver: V) -> Self {
        Self {
            config: SampledAlphaBetaConfig::default(),
            solver,
        }
    }

    pub fn with_config(config: SampledAlphaBetaConfig<R>, solver: V) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &SampledAlphaBetaConfig<R> {
        &self.config
    }

    /// Solve `state` to `max_depth`; returns the final `(α, β)` window.
    pub fn run<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
        root: &mut SampledNode<S>,
    ) -> Result<(R, R), SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        if !self.config.retain_principal {
            root.row_principal = 0;
            root.col_principal = 0;
        }
        let mut scratch = state.clone();
        self.double_oracle(
            max_depth,
            rng,
            &mut scratch,
            model,
            root,
            self.config.min_val,
            self.config.max_val,
        )
    }

    /// Solve at every depth `1..=max_depth` on a fresh tree per depth,
    /// reporting window, node count and timing. Principal indices carry
    /// from one depth to the next when `retain_principal` is set.
    pub fn run_iterative_deepening<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
    ) -> Result<(Vec<DepthReport<R>>, SampledNode<S>), SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        let mut reports = Vec::new();
        let mut root = SampledNode::default();
        for depth in 1..=max_depth {
            let mut next_root = SampledNode::default();
            if self.config.retain_principal {
                next_root.row_principal = root.row_principal;
                next_root.col_principal = root.col_principal;
            }
            let start = Instant::now();
            let mut scratch = state.clone();
            let (alpha, beta) = self.double_oracle(
                depth,
                rng,
                &mut scratch,
                model,
                &mut next_root,
                self.config.min_val,
                self.config.max_val,
            )?;
            reports.push(DepthReport {
                depth,
                alpha,
                beta,
                matrix_nodes: next_root.count_matrix_nodes(),
                elapsed_ms: start.elapsed().as_millis(),
            });
            root = next_root;
        }
        Ok((reports, root))
    }

    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    fn double_oracle<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &mut S,
        model: &mut M,
        node: &mut SampledNode<S>,
        mut alpha: R,
        mut beta: R,
    ) -> Result<(R, R), SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        if state.is_terminal() {
            let value = state.payoff().row();
            node.alpha = value;
            node.beta = value;
            return Ok((value, value));
        }

        state.update_actions();

        if node.depth >= max_depth {
            let mut output = ModelOutput::default();
            model.inference(state.clone(), &mut output);
            let value = output.value.row();
            node.alpha = value;
            node.beta = value;
            return Ok((value, value));
        }

        let rows = state.row_actions().len();
        let cols = state.col_actions().len();
        if rows == 0 {
            return Err(SearchError::EmptyActionSet { side: "row" });
        }
        if cols == 0 {
            return Err(SearchError::EmptyActionSet { side: "col" });
        }
        if node.cells.is_empty() {
            node.cells = Matrix::from_fn(rows, cols, |_, _| CellData::default());
        }

        node.row_support.clear();
        node.col_support.clear();
        let mut latest_row = node.row_principal.min(rows - 1);
        let mut latest_col = node.col_principal.min(cols - 1);
        node.row_support.push(latest_row);
        node.col_support.push(latest_col);

        let mut smaller_bounds = false;
        let mut new_action = true;
        let mut solved_exactly = true;

        while !alpha.fuzzy_eq(beta) && (smaller_bounds || new_action) {
            // Explore the cells the latest support additions opened up.
            for &row_idx in &node.row_support.clone() {
                solved_exactly &=
                    self.try_solve_cell(max_depth, rng, state, model, node, row_idx, latest_col)?;
            }
            for &col_idx in &node.col_support.clone() {
                solved_exactly &=
                    self.try_solve_cell(max_depth, rng, state, model, node, latest_row, col_idx)?;
            }

            // Solve the restricted game; inexact cells split into a
            // pessimistic matrix (row strategy) and an optimistic matrix
            // (column strategy).
            let support_i = node.row_support.clone();
            let support_j = node.col_support.clone();
            if solved_exactly {
                let matrix = Matrix::from_fn(support_i.len(), support_j.len(), |a, b| {
                    Value::new(node.cells.get(support_i[a], support_j[b]).alpha_explored)
                });
                let mut row_solution = Vec::new();
                let mut col_solution = Vec::new();
                self.solver
                    .solve(&matrix, &mut row_solution, &mut col_solution)?;
                node.row_solution = row_solution;
                node.col_solution = col_solution;
            } else {
                let alpha_matrix = Matrix::from_fn(support_i.len(), support_j.len(), |a, b| {
                    let cell = node.cells.get(support_i[a], support_j[b]);
                    Value::new(cell.alpha_explored + cell.unexplored * self.config.min_val)
                });
                let beta_matrix = Matrix::from_fn(support_i.len(), support_j.len(), |a, b| {
                    let cell = node.cells.get(support_i[a], support_j[b]);
                    Value::new(cell.beta_explored + cell.unexplored * self.config.max_val)
                });
                let mut row_solution = Vec::new();
                let mut col_solution = Vec::new();
                let mut scratch = Vec::new();
                self.solver
                    .solve(&alpha_matrix, &mut row_solution, &mut scratch)?;
                scratch.clear();
                self.solver
                    .solve(&beta_matrix, &mut scratch, &mut col_solution)?;
                node.row_solution = row_solution;
                node.col_solution = col_solution;
            }

            let (row_br, v_max) =
                self.best_response_row(max_depth, rng, state, model, node, alpha, self.config.max_val)?;
            let (col_br, v_min) =
                self.best_response_col(max_depth, rng, state, model, node, self.config.min_val, beta)?;

            // No response at least as good as the bound prunes the node.
            let Some(row_br) = row_br else {
                node.alpha = self.config.min_val;
                node.beta = self.config.min_val;
                return Ok((self.config.min_val, self.config.min_val));
            };
            let Some(col_br) = col_br else {
                node.alpha = self.config.max_val;
                node.beta = self.config.max_val;
                return Ok((self.config.max_val, self.config.max_val));
            };

            smaller_bounds = false;
            new_action = false;
            latest_row = row_br;
            latest_col = col_br;
            if !node.row_support.contains(&latest_row) {
                node.row_support.push(latest_row);
                new_action = true;
            }
            if !node.col_support.contains(&latest_col) {
                node.col_support.push(latest_col);
                new_action = true;
            }
            if v_min > alpha {
                alpha = v_min;
                smaller_bounds = true;
            }
            if v_max < beta {
                beta = v_max;
                smaller_bounds = true;
            }
        }

        // Cache the most probable actions as the next visit's support seeds,
        // then pad the restricted solutions out to the full action sets.
        if !node.row_solution.is_empty() {
            node.row_principal = node.row_support[argmax(&node.row_solution)];
        }
        if !node.col_solution.is_empty() {
            node.col_principal = node.col_support[argmax(&node.col_solution)];
        }
        let mut padded = vec![R::zero(); rows];
        for (a, &row_idx) in node.row_support.iter().enumerate() {
            if a < node.row_solution.len() {
                padded[row_idx] = node.row_solution[a];
            }
        }
        node.row_solution = padded;
        let mut padded = vec![R::zero(); cols];
        for (b, &col_idx) in node.col_support.iter().enumerate() {
            if b < node.col_solution.len() {
                padded[col_idx] = node.col_solution[b];
            }
        }
        node.col_solution = padded;

        alpha = alpha.canonicalized();
        beta = beta.canonicalized();
        node.alpha = alpha;
        node.beta = beta;
        Ok((alpha, beta))
    }

    /// Sample a cell until its budget is spent or its residual is small
    /// enough; returns whether the cell ended exactly solved.
    #[allow(clippy::too_many_arguments)]
    fn try_solve_cell<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
        node: &mut SampledNode<S>,
        row_idx: usize,
        col_idx: usize,
    ) -> Result<bool, SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        let row_action = state.row_actions()[row_idx];
        let col_action = state.col_actions()[col_idx];
        let depth = node.depth;
        let config = &self.config;

        loop {
            {
                let cell = node.cells.get(row_idx, col_idx);
                let within_budget = cell.tries < config.max_tries
                    && cell.unexplored > Prob::zero()
                    && (cell.tries < config.min_tries || cell.unexplored > config.max_unexplored);
                if !within_budget {
                    break;
                }
            }
            node.cells.get_mut(row_idx, col_idx).tries += 1;

            let seed: u64 = rng.gen();
            let mut next_state = state.clone();
            next_state.randomize_transition(seed);
            next_state.apply_actions(row_action, col_action);
            next_state.update_actions();
            let obs = next_state.obs();

            if node.cells.get(row_idx, col_idx).branches.contains_key(&obs) {
                continue;
            }
            let prob = next_state.prob();
            let mut child = Box::new(SampledNode::default());
            child.depth = depth + 1;
            let (child_alpha, child_beta) = self.double_oracle(
                max_depth,
                rng,
                &mut next_state,
                model,
                &mut child,
                config.min_val,
                config.max_val,
            )?;

            let cell = node.cells.get_mut(row_idx, col_idx);
            cell.alpha_explored += prob * child_alpha;
            cell.beta_explored += prob * child_beta;
            cell.unexplored -= prob;
            cell.branches.insert(obs, Branch { prob, seed, node: child });
        }

        Ok(node.cells.get(row_idx, col_idx).solved_exactly())
    }

    /// Sample a cell until one novel branch is produced or the budget runs
    /// out. Returns the new branch's `(prob, α, β)`.
    #[allow(clippy::too_many_arguments)]
    fn explore_cell_once<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
        node: &mut SampledNode<S>,
        row_idx: usize,
        col_idx: usize,
    ) -> Result<Option<(Prob<R>, R, R)>, SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        let row_action = state.row_actions()[row_idx];
        let col_action = state.col_actions()[col_idx];
        let depth = node.depth;
        let config = &self.config;

        loop {
            {
                let cell = node.cells.get(row_idx, col_idx);
                let within_budget = cell.tries < config.max_tries
                    && (cell.tries < config.min_tries || cell.unexplored > config.max_unexplored);
                if !within_budget {
                    return Ok(None);
                }
            }
            node.cells.get_mut(row_idx, col_idx).tries += 1;

            let seed: u64 = rng.gen();
            let mut next_state = state.clone();
            next_state.randomize_transition(seed);
            next_state.apply_actions(row_action, col_action);
            next_state.update_actions();
            let obs = next_state.obs();

            if node.cells.get(row_idx, col_idx).branches.contains_key(&obs) {
                continue;
            }
            let prob = next_state.prob();
            let mut child = Box::new(SampledNode::default());
            child.depth = depth + 1;
            let (child_alpha, child_beta) = self.double_oracle(
                max_depth,
                rng,
                &mut next_state,
                model,
                &mut child,
                config.min_val,
                config.max_val,
            )?;

            let cell = node.cells.get_mut(row_idx, col_idx);
            cell.alpha_explored += prob * child_alpha;
            cell.beta_explored += prob * child_beta;
            cell.unexplored -= prob;
            cell.branches.insert(obs, Branch { prob, seed, node: child });
            return Ok(Some((prob, child_alpha, child_beta)));
        }
    }

    /// Best response for the row player against the current column strategy.
    ///
    /// Candidate rows spend their exploration budget on the cells with the
    /// highest `strategy · unexplored` priority, but only while the row can
    /// still beat the incumbent under the optimistic closure of its residual
    /// mass. A cell that produces no new branch has its priority zeroed.
    #[allow(clippy::too_many_arguments)]
    fn best_response_row<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
        node: &mut SampledNode<S>,
        alpha: R,
        beta: R,
    ) -> Result<(Option<usize>, R), SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        let col_strategy = node.col_solution.clone();
        let support_i = node.row_support.clone();
        let support_j = node.col_support.clone();
        let mut best_response = alpha;
        let mut best_idx: Option<usize> = None;

        for row_idx in 0..state.row_actions().len() {
            let skip_exploration = support_i.contains(&row_idx);

            let mut expected_value = R::zero();
            let mut total_unexplored = R::zero();
            let mut priorities: Vec<R> = Vec::with_capacity(support_j.len());
            let mut max_priority = R::zero();
            let mut col_idx = support_j[0];
            let mut next_j = 0;
            for (j, &col_idx_temp) in support_j.iter().enumerate() {
                let cell = node.cells.get(row_idx, col_idx_temp);
                expected_value += col_strategy[j] * cell.beta_explored;
                let priority = if skip_exploration || cell.tries >= self.config.max_tries {
                    R::zero()
                } else {
                    cell.unexplored * col_strategy[j]
                };
                total_unexplored += cell.unexplored * col_strategy[j];
                priorities.push(priority);
                if priority > max_priority {
                    col_idx = col_idx_temp;
                    max_priority = priority;
                    next_j = j;
                }
            }

            while max_priority > R::zero()
                && expected_value + beta * total_unexplored >= best_response
            {
                let produced = self.explore_cell_once(
                    max_depth, rng, state, model, node, row_idx, col_idx,
                )?;
                if let Some((prob, _child_alpha, child_beta)) = produced {
                    expected_value += prob * child_beta * col_strategy[next_j];
                    total_unexplored -= prob * col_strategy[next_j];
                    priorities[next_j] -= prob * col_strategy[next_j];
                    if self.config.clamp_unexplored {
                        if total_unexplored < R::zero() {
                            total_unexplored = R::zero();
                        }
                        if priorities[next_j] < R::zero() {
                            priorities[next_j] = R::zero();
                        }
                    }
                } else {
                    priorities[next_j] = R::zero();
                }

                max_priority = R::zero();
                for (j, &col_idx_temp) in support_j.iter().enumerate() {
                    if priorities[j] > max_priority {
                        col_idx = col_idx_temp;
                        max_priority = priorities[j];
                        next_j = j;
                    }
                }
            }

            // Residual mass closes optimistically for the row player.
            let expected = (expected_value + total_unexplored * beta).canonicalized();
            if expected >= best_response
                || (best_idx.is_none() && expected.fuzzy_eq(best_response))
            {
                best_idx = Some(row_idx);
                best_response = expected;
            }
        }
        Ok((best_idx, best_response))
    }

    /// Mirror of [`Self::best_response_row`]: the column player minimizes on
    /// the pessimistic closure.
    #[allow(clippy::too_many_arguments)]
    fn best_response_col<S, M, G>(
        &self,
        max_depth: usize,
        rng: &mut G,
        state: &S,
        model: &mut M,
        node: &mut SampledNode<S>,
        alpha: R,
        beta: R,
    ) -> Result<(Option<usize>, R), SearchError>
    where
        S: State<Real = R>,
        M: Model<S>,
        V: MatrixSolver<R>,
        G: Rng,
    {
        let row_strategy = node.row_solution.clone();
        let support_i = node.row_support.clone();
        let support_j = node.col_support.clone();
        let mut best_response = beta;
        let mut best_idx: Option<usize> = None;

        for col_idx in 0..state.col_actions().len() {
            let skip_exploration = support_j.contains(&col_idx);

            let mut expected_value = R::zero();
            let mut total_unexplored = R::zero();
            let mut priorities: Vec<R> = Vec::with_capacity(support_i.len());
            let mut max_priority = R::zero();
            let mut row_idx = support_i[0];
            let mut next_i = 0;
            for (i, &row_idx_temp) in support_i.iter().enumerate() {
                let cell = node.cells.get(row_idx_temp, col_idx);
                expected_value += row_strategy[i] * cell.alpha_explored;
                let priority = if skip_exploration || cell.tries >= self.config.max_tries {
                    R::zero()
                } else {
                    cell.unexplored * row_strategy[i]
                };
                total_unexplored += cell.unexplored * row_strategy[i];
                priorities.push(priority);
                if priority > max_priority {
                    row_idx = row_idx_temp;
                    max_priority = priority;
                    next_i = i;
                }
            }

            while max_priority > R::zero()
                && expected_value + alpha * total_unexplored <= best_response
            {
                let produced = self.explore_cell_once(
                    max_depth, rng, state, model, node, row_idx, col_idx,
                )?;
                if let Some((prob, child_alpha, _child_beta)) = produced {
                    expected_value += prob * child_alpha * row_strategy[next_i];
                    total_unexplored -= prob * row_strategy[next_i];
                    priorities[next_i] -= prob * row_strategy[next_i];
                    if self.config.clamp_unexplored {
                        if total_unexplored < R::zero() {
                            total_unexplored = R::zero();
                        }
                        if priorities[next_i] < R::zero() {
                            priorities[next_i] = R::zero();
                        }
                    }
                } else {
                    priorities[next_i] = R::zero();
                }

                max_priority = R::zero();
                for (i, &row_idx_temp) in support_i.iter().enumerate() {
                    if priorities[i] > max_priority {
                        row_idx = row_idx_temp;
                        max_priority = priorities[i];
                        next_i = i;
                    }
                }
            }

            // Residual mass closes pessimistically for the column player.
            let expected = (expected_value + total_unexplored * alpha).canonicalized();
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

fn argmax<R: Scalar>(values: &[R]) -> usize {
    let mut best = 0;
    for (idx, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MatrixGameState, StochasticTreeState};
    use crate::model::MonteCarloModel;
    use crate::nash::SupportEnumeration;
    use crate::num::Rational;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use test_macros::timed_test;

    fn two_action_config() -> SampledAlphaBetaConfig<Rational> {
        SampledAlphaBetaConfig {
            min_tries: 4,
            max_tries: 64,
            max_unexplored: Prob::new(Rational::new(1, 64)),
            ..SampledAlphaBetaConfig::default()
        }
    }

    #[timed_test]
    fn deterministic_game_converges_exactly() {
        // Deterministic transitions: a single branch resolves each cell.
        let state: MatrixGameState<Rational> = MatrixGameState::matching_pennies();
        let search = SampledAlphaBeta::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(1);
        let mut root = SampledNode::default();
        let (alpha, beta) = search.run(2, &mut rng, &state, &mut model, &mut root).unwrap();
        assert_eq!(alpha, Rational::new(1, 2));
        assert_eq!(beta, Rational::new(1, 2));
        assert_eq!(root.row_solution, vec![Rational::new(1, 2), Rational::new(1, 2)]);
    }

    #[timed_test(10_000)]
    fn stochastic_game_respects_the_cell_budget() {
        let state: StochasticTreeState<Rational> = StochasticTreeState::new(2, 2, 2, 17);
        let search = SampledAlphaBeta::with_config(two_action_config(), SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(5);
        let mut root = SampledNode::default();
        let (alpha, beta) = search.run(2, &mut rng, &state, &mut model, &mut root).unwrap();

        assert!(alpha.fuzzy_eq(beta), "window must close: {alpha} vs {beta}");
        for &row_idx in &root.row_support {
            for &col_idx in &root.col_support {
                let cell = root.cells.get(row_idx, col_idx);
                assert!(
                    cell.unexplored <= Prob::new(Rational::new(1, 64)) || cell.tries == 64,
                    "support cell over budget: unexplored {:?}, tries {}",
                    cell.unexplored,
                    cell.tries
                );
            }
        }
    }

    #[timed_test(10_000)]
    fn branch_mass_partitions_unity() {
        let state: StochasticTreeState<Rational> = StochasticTreeState::new(2, 2, 2, 3);
        let search = SampledAlphaBeta::with_config(two_action_config(), SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(9);
        let mut root = SampledNode::default();
        search.run(2, &mut rng, &state, &mut model, &mut root).unwrap();

        for cell in root.cells.iter() {
            let branch_mass = cell
                .branches
                .values()
                .fold(Prob::zero(), |acc, branch| acc + branch.prob);
            assert_eq!(
                (branch_mass + cell.unexplored).canonicalized(),
                Prob::one(),
                "unexplored + branch mass must be exactly one"
            );
            assert!(cell.alpha_explored >= Rational::new(0, 1));
            assert!(cell.alpha_explored <= cell.beta_explored);
        }
    }

    #[timed_test(10_000)]
    fn same_seed_reproduces_the_run() {
        let state: StochasticTreeState<Rational> = StochasticTreeState::new(2, 2, 2, 23);
        let search = SampledAlphaBeta::with_config(two_action_config(), SupportEnumeration);

        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(11);
        let mut first = SampledNode::default();
        let window_a = search.run(2, &mut rng, &state, &mut model, &mut first).unwrap();

        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(11);
        let mut second = SampledNode::default();
        let window_b = search.run(2, &mut rng, &state, &mut model, &mut second).unwrap();

        assert_eq!(window_a, window_b);
        assert_eq!(first.count_matrix_nodes(), second.count_matrix_nodes());
        assert_eq!(first.row_solution, second.row_solution);
    }

    #[timed_test]
    fn principal_reset_is_configurable() {
        let state: MatrixGameState<Rational> =
            MatrixGameState::from_fractions(&[&[(1, 4), (1, 2)], &[(3, 4), (1, 1)]]);
        let config = SampledAlphaBetaConfig {
            retain_principal: false,
            ..SampledAlphaBetaConfig::default()
        };
        let search = SampledAlphaBeta::with_config(config, SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut root = SampledNode::default();
        search.run(2, &mut rng, &state, &mut model, &mut root).unwrap();
        // The saddle sits at row 1; the cache records it after the run.
        assert_eq!(root.row_principal, 1);

        root.row_principal = 99;
        root.col_principal = 99;
        // Reset mode must not trust the stale cache.
        search.run(2, &mut rng, &state, &mut model, &mut root).unwrap();
        assert_eq!(root.row_principal, 1);
    }

    #[timed_test(15_000)]
    fn iterative_deepening_reports_every_depth() {
        let state: StochasticTreeState<Rational> = StochasticTreeState::new(2, 2, 3, 7);
        let search = SampledAlphaBeta::with_config(two_action_config(), SupportEnumeration);
        let mut model = MonteCarloModel::new(0);
        let mut rng = SmallRng::seed_from_u64(3);
        let (reports, root) = search
            .run_iterative_deepening(3, &mut rng, &state, &mut model)
            .unwrap();
        assert_eq!(reports.len(), 3);
        for (idx, report) in reports.iter().enumerate() {
            assert_eq!(report.depth, idx + 1);
            assert!(report.matrix_nodes >= 1);
        }
        assert!(root.count_matrix_nodes() >= reports[2].matrix_nodes);
    }
}
