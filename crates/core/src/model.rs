//! Model abstraction: leaf evaluation for depth-limited and bandit searches.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::game::State;
use crate::num::{Scalar, Value};

/// Result of a model query: a leaf value and optional priors over the
/// current action sets.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput<R: Scalar> {
    pub value: Value<R>,
    pub row_policy: Vec<R>,
    pub col_policy: Vec<R>,
}

/// Leaf evaluator. Implementations may be rollout-based, learned, or exact
/// oracles; the searches only consume this interface.
pub trait Model<S: State> {
    /// Evaluate one state. The state is consumed; rollout models advance it.
    fn inference(&mut self, state: S, output: &mut ModelOutput<S::Real>);

    /// Evaluate a batch of states, one output per input.
    fn inference_batch(&mut self, states: Vec<S>, outputs: &mut Vec<ModelOutput<S::Real>>) {
        outputs.clear();
        outputs.reserve(states.len());
        for state in states {
            let mut output = ModelOutput::default();
            self.inference(state, &mut output);
            outputs.push(output);
        }
    }
}

/// Monte-Carlo model: uniform random rollout to a terminal state.
#[derive(Debug, Clone)]
pub struct MonteCarloModel {
    rng: SmallRng,
    with_policy: bool,
}

impl MonteCarloModel {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            with_policy: false,
        }
    }

    /// Also emit uniform priors over the current action sets.
    #[must_use]
    pub fn with_policy(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            with_policy: true,
        }
    }

    fn rollout<S: State>(&mut self, state: &mut S) {
        while !state.is_terminal() {
            let rows = state.row_actions().len();
            let cols = state.col_actions().len();
            debug_assert!(rows > 0 && cols > 0, "non-terminal state with no actions");
            let row_action = state.row_actions()[self.rng.gen_range(0..rows)];
            let col_action = state.col_actions()[self.rng.gen_range(0..cols)];
            state.randomize_transition(self.rng.gen());
            state.apply_actions(row_action, col_action);
            state.update_actions();
        }
    }
}

impl<S: State> Model<S> for MonteCarloModel {
    fn inference(&mut self, mut state: S, output: &mut ModelOutput<S::Real>) {
        if self.with_policy {
            let rows = state.row_actions().len();
            let cols = state.col_actions().len();
            #[allow(clippy::cast_possible_wrap)]
            {
                output.row_policy =
                    vec![<S::Real as Scalar>::from_fraction(1, rows.max(1) as i64); rows];
                output.col_policy =
                    vec![<S::Real as Scalar>::from_fraction(1, cols.max(1) as i64); cols];
            }
        }
        self.rollout(&mut state);
        output.value = state.payoff();
    }

    /// Batch rollouts run in parallel, each item on its own derived seed, so
    /// a batch is as reproducible as the sequential path.
    fn inference_batch(&mut self, states: Vec<S>, outputs: &mut Vec<ModelOutput<S::Real>>) {
        let seeds: Vec<u64> = (0..states.len()).map(|_| self.rng.gen()).collect();
        let with_policy = self.with_policy;
        *outputs = states
            .into_par_iter()
            .zip(seeds)
            .map(|(state, seed)| {
                let mut model = if with_policy {
                    MonteCarloModel::with_policy(seed)
                } else {
                    MonteCarloModel::new(seed)
                };
                let mut output = ModelOutput::default();
                Model::<S>::inference(&mut model, state, &mut output);
                output
            })
            .collect();
    }
}
