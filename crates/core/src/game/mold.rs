use std::marker::PhantomData;

use crate::game::{EnumerableChance, State};
use crate::num::{Prob, Scalar, Value};

/// Uniform game tree that grows until its move budget runs out.
///
/// Every interior state offers the same `size` actions to both players, every
/// transition is deterministic (a single chance outcome with probability
/// one), and every leaf pays the row player zero.
#[derive(Debug, Clone)]
pub struct MoldState<R: Scalar> {
    actions: Vec<u8>,
    moves_left: usize,
    _real: PhantomData<R>,
}

impl<R: Scalar> MoldState<R> {
    /// `size` actions per side, terminal after `depth` joint moves.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(size: usize, depth: usize) -> Self {
        Self {
            actions: (0..size).map(|a| a as u8).collect(),
            moves_left: depth,
            _real: PhantomData,
        }
    }

    #[must_use]
    pub fn moves_left(&self) -> usize {
        self.moves_left
    }
}

impl<R: Scalar> State for MoldState<R> {
    type Real = R;
    type Action = u8;
    type Obs = u8;

    fn update_actions(&mut self) {}

    fn row_actions(&self) -> &[u8] {
        if self.is_terminal() {
            &[]
        } else {
            &self.actions
        }
    }

    fn col_actions(&self) -> &[u8] {
        self.row_actions()
    }

    fn is_terminal(&self) -> bool {
        self.moves_left == 0
    }

    fn payoff(&self) -> Value<R> {
        Value::new(R::zero())
    }

    fn apply_actions(&mut self, _row_action: u8, _col_action: u8) {
        self.moves_left = self.moves_left.saturating_sub(1);
    }

    fn randomize_transition(&mut self, _seed: u64) {}

    fn obs(&self) -> u8 {
        0
    }

    fn prob(&self) -> Prob<R> {
        Prob::one()
    }
}

impl<R: Scalar> EnumerableChance for MoldState<R> {
    fn chance_actions(&self, _row_action: u8, _col_action: u8) -> Vec<u8> {
        vec![0]
    }

    fn apply_actions_with_chance(&mut self, row_action: u8, col_action: u8, _chance_action: &u8) {
        self.apply_actions(row_action, col_action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn terminal_after_depth_moves() {
        let mut state: MoldState<f64> = MoldState::new(3, 2);
        assert!(!state.is_terminal());
        state.apply_actions(0, 1);
        assert!(!state.is_terminal());
        state.apply_actions(2, 2);
        assert!(state.is_terminal());
        assert!(state.row_actions().is_empty());
    }

    #[timed_test]
    fn single_deterministic_chance_branch() {
        let state: MoldState<f64> = MoldState::new(3, 2);
        assert_eq!(state.chance_actions(0, 0), vec![0]);
        assert_eq!(state.prob(), Prob::one());
    }
}
