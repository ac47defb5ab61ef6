//! Matrix-game solving.
//!
//! Every search delegates its sub-matrix equilibria to a [`MatrixSolver`].
//! The crate ships [`SupportEnumeration`], a self-contained exact solver for
//! the small sub-games the searches produce: it checks every square support
//! pair, solves the indifference system by Gaussian elimination, and verifies
//! the candidate against all deviations. In rational mode the result is
//! exact; in float mode comparisons use the shared fuzzy epsilon.

use crate::error::SearchError;
use crate::num::{Matrix, Scalar, Value, FUZZY_EPSILON};

/// Zero-sum matrix-game solver.
///
/// `solve` fills `row_strategy` (length `rows`) and `col_strategy` (length
/// `cols`) with a Nash equilibrium of the zero-sum game given by the row
/// player's payoffs, and returns the game value for the row player.
pub trait MatrixSolver<R: Scalar> {
    fn solve(
        &self,
        payoffs: &Matrix<Value<R>>,
        row_strategy: &mut Vec<R>,
        col_strategy: &mut Vec<R>,
    ) -> Result<R, SearchError>;
}

/// Shapley–Snow style support enumeration.
///
/// Every zero-sum matrix game has an equilibrium with equal-size supports
/// whose restricted system is solvable, so enumerating square support pairs
/// in increasing size always terminates with an answer. Cost is
/// combinatorial; the searches only ever hand it restricted sub-matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportEnumeration;

impl<R: Scalar> MatrixSolver<R> for SupportEnumeration {
    fn solve(
        &self,
        payoffs: &Matrix<Value<R>>,
        row_strategy: &mut Vec<R>,
        col_strategy: &mut Vec<R>,
    ) -> Result<R, SearchError> {
        let rows = payoffs.rows();
        let cols = payoffs.cols();
        if rows == 0 || cols == 0 {
            return Err(SearchError::DegenerateMatrix { rows, cols });
        }

        for k in 1..=rows.min(cols) {
            for support_i in combinations(rows, k) {
                for support_j in combinations(cols, k) {
                    if let Some((x, y, value)) =
                        try_support(payoffs, &support_i, &support_j)
                    {
                        row_strategy.clear();
                        row_strategy.resize(rows, R::zero());
                        for (a, &i) in support_i.iter().enumerate() {
                            row_strategy[i] = x[a];
                        }
                        col_strategy.clear();
                        col_strategy.resize(cols, R::zero());
                        for (b, &j) in support_j.iter().enumerate() {
                            col_strategy[j] = y[b];
                        }
                        return Ok(value.canonicalized());
                    }
                }
            }
        }

        // Unreachable for well-formed payoffs; float pathologies end up here.
        Err(SearchError::NoEquilibrium { rows, cols })
    }
}

/// Exploitability of a strategy pair against the given payoff matrix: the
/// total gain available to the two best responses. Zero at an equilibrium.
pub fn exploitability<R: Scalar>(
    payoffs: &Matrix<Value<R>>,
    row_strategy: &[R],
    col_strategy: &[R],
) -> R {
    let rows = payoffs.rows();
    let cols = payoffs.cols();
    let mut row_payoff = R::zero();
    let mut col_payoff = R::zero();
    let mut row_response = vec![R::zero(); rows];
    let mut col_response = vec![R::zero(); cols];

    for i in 0..rows {
        for j in 0..cols {
            let value = *payoffs.get(i, j);
            let u = col_strategy[j] * value.row();
            let v = row_strategy[i] * value.col();
            row_payoff += u * row_strategy[i];
            col_payoff += v * col_strategy[j];
            row_response[i] += u;
            col_response[j] += v;
        }
    }

    let row_best = row_response
        .into_iter()
        .fold(R::zero(), Scalar::max);
    let col_best = col_response
        .into_iter()
        .fold(R::zero(), Scalar::max);

    (row_best - row_payoff + col_best - col_payoff).canonicalized()
}

/// All `k`-subsets of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());
        // Advance the rightmost index that still has room.
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if current[pos] + (k - pos) < n {
                current[pos] += 1;
                for later in pos + 1..k {
                    current[later] = current[later - 1] + 1;
                }
                break;
            }
            if pos == 0 {
                return out;
            }
        }
        if k == 0 {
            return out;
        }
    }
}

/// Solve the indifference system for one support pair and verify it.
fn try_support<R: Scalar>(
    payoffs: &Matrix<Value<R>>,
    support_i: &[usize],
    support_j: &[usize],
) -> Option<(Vec<R>, Vec<R>, R)> {
    let k = support_i.len();

    // Row mixture x and value v: the column player is indifferent over J.
    let mut a = vec![vec![R::zero(); k + 1]; k + 1];
    let mut b = vec![R::zero(); k + 1];
    for (eq, &j) in support_j.iter().enumerate() {
        for (var, &i) in support_i.iter().enumerate() {
            a[eq][var] = payoffs.get(i, j).row();
        }
        a[eq][k] = -R::one();
    }
    for coeff in a[k].iter_mut().take(k) {
        *coeff = R::one();
    }
    b[k] = R::one();
    let x_solution = solve_linear(a, b)?;
    let value = x_solution[k];
    let x = &x_solution[..k];

    // Column mixture y and value w: the row player is indifferent over I.
    let mut a = vec![vec![R::zero(); k + 1]; k + 1];
    let mut b = vec![R::zero(); k + 1];
    for (eq, &i) in support_i.iter().enumerate() {
        for (var, &j) in support_j.iter().enumerate() {
            a[eq][var] = payoffs.get(i, j).row();
        }
        a[eq][k] = -R::one();
    }
    for coeff in a[k].iter_mut().take(k) {
        *coeff = R::one();
    }
    b[k] = R::one();
    let y_solution = solve_linear(a, b)?;
    let w = y_solution[k];
    let y = &y_solution[..k];

    if !value.fuzzy_eq(w) {
        return None;
    }

    let x = normalize_mixture(x)?;
    let y = normalize_mixture(y)?;

    // No profitable deviation outside the supports.
    for i in 0..payoffs.rows() {
        if support_i.contains(&i) {
            continue;
        }
        let mut deviation = R::zero();
        for (b_idx, &j) in support_j.iter().enumerate() {
            deviation += y[b_idx] * payoffs.get(i, j).row();
        }
        if deviation > value && !deviation.fuzzy_eq(value) {
            return None;
        }
    }
    for j in 0..payoffs.cols() {
        if support_j.contains(&j) {
            continue;
        }
        let mut deviation = R::zero();
        for (a_idx, &i) in support_i.iter().enumerate() {
            deviation += x[a_idx] * payoffs.get(i, j).row();
        }
        if deviation < value && !deviation.fuzzy_eq(value) {
            return None;
        }
    }

    Some((x, y, value))
}

/// Reject mixtures with genuinely negative weights; clamp float dust and
/// renormalize so the weights sum to one.
fn normalize_mixture<R: Scalar>(mixture: &[R]) -> Option<Vec<R>> {
    let mut out = Vec::with_capacity(mixture.len());
    for &p in mixture {
        if p < R::zero() {
            if R::EXACT || p.to_f64() < -FUZZY_EPSILON {
                return None;
            }
            out.push(R::zero());
        } else {
            out.push(p);
        }
    }
    let total = out.iter().fold(R::zero(), |acc, &p| acc + p);
    if total == R::zero() {
        return None;
    }
    for p in &mut out {
        *p = (*p / total).canonicalized();
    }
    Some(out)
}

/// Gaussian elimination with partial pivoting. Returns `None` when the
/// system is singular.
fn solve_linear<R: Scalar>(mut a: Vec<Vec<R>>, mut b: Vec<R>) -> Option<Vec<R>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&p, &q| {
            a[p][col]
                .abs()
                .to_f64()
                .partial_cmp(&a[q][col].abs().to_f64())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot_row][col] == R::zero()
            || (!R::EXACT && a[pivot_row][col].abs().to_f64() < 1e-12)
        {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot;
            if factor == R::zero() {
                continue;
            }
            for c in col..n {
                let delta = factor * a[col][c];
                a[row][c] -= delta;
            }
            let delta = factor * b[col];
            b[row] -= delta;
        }
    }

    let mut solution = vec![R::zero(); n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for c in row + 1..n {
            acc -= a[row][c] * solution[c];
        }
        solution[row] = (acc / a[row][row]).canonicalized();
    }
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Rational;
    use test_macros::timed_test;

    fn matrix_from_fractions<R: Scalar>(rows: &[&[(i64, i64)]]) -> Matrix<Value<R>> {
        let c = rows[0].len();
        Matrix::from_fn(rows.len(), c, |i, j| {
            let (num, den) = rows[i][j];
            Value::new(R::from_fraction(num, den))
        })
    }

    #[timed_test]
    fn matching_pennies_mixes_evenly() {
        let payoffs: Matrix<Value<Rational>> =
            matrix_from_fractions(&[&[(1, 1), (0, 1)], &[(0, 1), (1, 1)]]);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&payoffs, &mut x, &mut y).unwrap();
        assert_eq!(value, Rational::new(1, 2));
        assert_eq!(x, vec![Rational::new(1, 2), Rational::new(1, 2)]);
        assert_eq!(y, vec![Rational::new(1, 2), Rational::new(1, 2)]);
    }

    #[timed_test]
    fn saddle_point_is_pure() {
        // Row 1 dominates; column 0 is the minimizer's best reply.
        let payoffs: Matrix<Value<f64>> =
            matrix_from_fractions(&[&[(1, 4), (1, 2)], &[(3, 4), (1, 1)]]);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&payoffs, &mut x, &mut y).unwrap();
        assert!((value - 0.75).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-9);
        assert!((y[0] - 1.0).abs() < 1e-9);
    }

    #[timed_test]
    fn known_mixed_value_is_exact() {
        // Symmetric diagonal game with value 7/12.
        let payoffs: Matrix<Value<Rational>> =
            matrix_from_fractions(&[&[(5, 6), (1, 3)], &[(1, 3), (5, 6)]]);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&payoffs, &mut x, &mut y).unwrap();
        assert_eq!(value, Rational::new(7, 12));
        assert_eq!(x, vec![Rational::new(1, 2), Rational::new(1, 2)]);
    }

    #[timed_test]
    fn solver_output_has_zero_exploitability() {
        let payoffs: Matrix<Value<Rational>> = matrix_from_fractions(&[
            &[(1, 1), (0, 1), (1, 2)],
            &[(0, 1), (1, 1), (1, 2)],
            &[(1, 4), (3, 4), (1, 2)],
        ]);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&payoffs, &mut x, &mut y).unwrap();
        assert_eq!(exploitability(&payoffs, &x, &y), Rational::new(0, 1));
        // Value consistency: x' M y == value.
        let mut acc = Rational::new(0, 1);
        for i in 0..3 {
            for j in 0..3 {
                acc += x[i] * y[j] * payoffs.get(i, j).row();
            }
        }
        assert_eq!(acc, value);
    }

    #[timed_test]
    fn degenerate_matrix_is_an_error() {
        let payoffs: Matrix<Value<f64>> = Matrix::default();
        let mut x = Vec::new();
        let mut y = Vec::new();
        assert!(matches!(
            SupportEnumeration.solve(&payoffs, &mut x, &mut y),
            Err(SearchError::DegenerateMatrix { .. })
        ));
    }

    #[timed_test]
    fn single_cell_game_is_trivial() {
        let payoffs: Matrix<Value<f64>> = matrix_from_fractions(&[&[(1, 2)]]);
        let mut x = Vec::new();
        let mut y = Vec::new();
        let value = SupportEnumeration.solve(&payoffs, &mut x, &mut y).unwrap();
        assert!((value - 0.5).abs() < 1e-12);
        assert_eq!(x, vec![1.0]);
        assert_eq!(y, vec![1.0]);
    }
}
