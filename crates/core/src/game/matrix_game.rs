use crate::game::{EnumerableChance, State};
use crate::num::{Matrix, Prob, Scalar, Value};

/// One-shot matrix game: a single joint action reaches a terminal payoff.
///
/// Transitions are deterministic, so the chance support is a single
/// observation with probability one.
#[derive(Debug, Clone)]
pub struct MatrixGameState<R: Scalar> {
    payoffs: Matrix<Value<R>>,
    row_actions: Vec<u8>,
    col_actions: Vec<u8>,
    outcome: Option<Value<R>>,
}

impl<R: Scalar> MatrixGameState<R> {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(payoffs: Matrix<Value<R>>) -> Self {
        let row_actions = (0..payoffs.rows()).map(|a| a as u8).collect();
        let col_actions = (0..payoffs.cols()).map(|a| a as u8).collect();
        Self {
            payoffs,
            row_actions,
            col_actions,
            outcome: None,
        }
    }

    /// Build from row-player payoffs given as `(numerator, denominator)`
    /// fractions, one inner slice per row.
    ///
    /// # Panics
    ///
    /// Panics if the rows are ragged.
    #[must_use]
    pub fn from_fractions(rows: &[&[(i64, i64)]]) -> Self {
        let r = rows.len();
        let c = rows.first().map_or(0, |row| row.len());
        assert!(rows.iter().all(|row| row.len() == c), "ragged payoff rows");
        Self::new(Matrix::from_fn(r, c, |i, j| {
            let (num, den) = rows[i][j];
            Value::new(R::from_fraction(num, den))
        }))
    }

    /// The 2×2 matching-pennies game: row wins on a match.
    #[must_use]
    pub fn matching_pennies() -> Self {
        Self::from_fractions(&[&[(1, 1), (0, 1)], &[(0, 1), (1, 1)]])
    }

    /// 1×1 game with a single payoff.
    #[must_use]
    pub fn single(payoff: Value<R>) -> Self {
        Self::new(Matrix::filled(1, 1, payoff))
    }
}

impl<R: Scalar> State for MatrixGameState<R> {
    type Real = R;
    type Action = u8;
    type Obs = u8;

    fn update_actions(&mut self) {}

    fn row_actions(&self) -> &[u8] {
        if self.is_terminal() {
            &[]
        } else {
            &self.row_actions
        }
    }

    fn col_actions(&self) -> &[u8] {
        if self.is_terminal() {
            &[]
        } else {
            &self.col_actions
        }
    }

    fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    fn payoff(&self) -> Value<R> {
        debug_assert!(self.is_terminal(), "payoff of a non-terminal state");
        self.outcome.unwrap_or_default()
    }

    fn apply_actions(&mut self, row_action: u8, col_action: u8) {
        self.outcome = Some(*self.payoffs.get(row_action as usize, col_action as usize));
    }

    fn randomize_transition(&mut self, _seed: u64) {}

    fn obs(&self) -> u8 {
        0
    }

    fn prob(&self) -> Prob<R> {
        Prob::one()
    }
}

impl<R: Scalar> EnumerableChance for MatrixGameState<R> {
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
    use crate::num::Rational;
    use test_macros::timed_test;

    #[timed_test]
    fn one_joint_action_ends_the_game() {
        let mut state: MatrixGameState<f64> = MatrixGameState::matching_pennies();
        assert_eq!(state.row_actions(), &[0, 1]);
        state.apply_actions(0, 0);
        assert!(state.is_terminal());
        assert!((state.payoff().row() - 1.0).abs() < 1e-12);
    }

    #[timed_test]
    fn fractions_build_exact_payoffs() {
        let mut state: MatrixGameState<Rational> =
            MatrixGameState::from_fractions(&[&[(5, 6), (1, 3)], &[(1, 3), (5, 6)]]);
        state.apply_actions(1, 0);
        assert_eq!(state.payoff().row(), Rational::new(1, 3));
    }
}
