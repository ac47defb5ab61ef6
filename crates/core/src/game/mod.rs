//! Game abstraction: the state contract consumed by every search, plus the
//! small test states used throughout the test suites.

mod matrix_game;
mod mold;
mod stochastic_tree;

use std::fmt::Debug;
use std::hash::Hash;

pub use matrix_game::MatrixGameState;
pub use mold::MoldState;
pub use stochastic_tree::StochasticTreeState;

use crate::num::{Prob, Scalar, Value};

/// A two-player zero-sum simultaneous-move game state.
///
/// States are value types: searches clone them freely and advance the clones.
/// `update_actions` refreshes the cached action lists after a transition;
/// `is_terminal` must be answerable at any time. Transitions are stochastic:
/// `apply_actions` consumes the internal seed, and `obs`/`prob` describe the
/// most recent chance outcome.
pub trait State: Clone + Send {
    type Real: Scalar;
    type Action: Copy + PartialEq + Debug + Send + Sync;
    type Obs: Clone + Eq + Hash + Debug + Send + Sync;

    /// Refresh the cached `row_actions`/`col_actions` for the current state.
    fn update_actions(&mut self);

    fn row_actions(&self) -> &[Self::Action];

    fn col_actions(&self) -> &[Self::Action];

    fn is_terminal(&self) -> bool;

    /// Payoff of a terminal state.
    fn payoff(&self) -> Value<Self::Real>;

    /// Advance by a joint action; chance is resolved by the internal seed.
    fn apply_actions(&mut self, row_action: Self::Action, col_action: Self::Action);

    /// Reseed the internal chance source.
    fn randomize_transition(&mut self, seed: u64);

    /// Observation identifying the most recent chance outcome.
    fn obs(&self) -> Self::Obs;

    /// Probability of the most recent chance outcome.
    fn prob(&self) -> Prob<Self::Real>;
}

/// States whose chance support is enumerable, required by full traversal and
/// the enumerable alpha-beta solver.
pub trait EnumerableChance: State {
    /// All chance outcomes of the joint action, as observations.
    fn chance_actions(&self, row_action: Self::Action, col_action: Self::Action)
        -> Vec<Self::Obs>;

    /// Advance by a joint action with an explicit chance outcome.
    fn apply_actions_with_chance(
        &mut self,
        row_action: Self::Action,
        col_action: Self::Action,
        chance_action: &Self::Obs,
    );
}
