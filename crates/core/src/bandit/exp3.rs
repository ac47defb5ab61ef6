//! Exp3: exponential-weights bandit with explicit exploration.
//!
//! Forecast: `(1 − γ)·softmax(gains · γ/k) + γ/k` per side, sampled
//! independently for both players. Gains are importance-weighted by the
//! selection probability and shifted to stay non-positive so the softmax
//! cannot overflow while relative order is preserved.

use rand::Rng;

use super::{power_norm, sample_pdf, Bandit, Outcome};
use crate::model::ModelOutput;
use crate::num::{Scalar, Value};

#[derive(Debug, Clone)]
pub struct Exp3<R: Scalar> {
    gamma: R,
}

impl<R: Scalar> Exp3<R> {
    /// `gamma` is the exploration rate in `(0, 1]`.
    #[must_use]
    pub fn new(gamma: R) -> Self {
        Self { gamma }
    }

    #[must_use]
    pub fn gamma(&self) -> R {
        self.gamma
    }

    fn forecast(&self, gains: &[R]) -> Vec<R> {
        let k = gains.len();
        if k == 1 {
            return vec![R::one()];
        }
        #[allow(clippy::cast_possible_wrap)]
        let eta = self.gamma / R::from_fraction(k as i64, 1);
        let mut forecast = softmax(gains, eta);
        let one_minus_gamma = R::one() - self.gamma;
        for p in &mut forecast {
            *p = one_minus_gamma * *p + eta;
        }
        forecast
    }
}

impl<R: Scalar> Default for Exp3<R> {
    fn default() -> Self {
        Self::new(R::from_fraction(1, 100))
    }
}

/// Softmax with the max-shift trick: gains are translated so the largest is
/// zero before exponentiation.
fn softmax<R: Scalar>(gains: &[R], eta: R) -> Vec<R> {
    let max = gains.iter().copied().fold(gains[0], Scalar::max);
    let mut sum = R::zero();
    let mut out: Vec<R> = gains
        .iter()
        .map(|&g| {
            let weight = ((g - max) * eta).exp();
            sum += weight;
            weight
        })
        .collect();
    for w in &mut out {
        *w /= sum;
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct Exp3Stats<R: Scalar> {
    pub row_gains: Vec<R>,
    pub col_gains: Vec<R>,
    pub row_visits: Vec<u32>,
    pub col_visits: Vec<u32>,
    pub visits: u64,
    /// Sum of back-propagated row values.
    pub value_total: R,
}

impl<R: Scalar> Bandit<R> for Exp3<R> {
    type MatrixStats = Exp3Stats<R>;
    type ChanceStats = ();

    fn expand(
        &self,
        rows: usize,
        cols: usize,
        _output: &ModelOutput<R>,
        stats: &mut Exp3Stats<R>,
    ) {
        stats.row_gains = vec![R::zero(); rows];
        stats.col_gains = vec![R::zero(); cols];
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
        stats.visits = 0;
        stats.value_total = R::zero();
    }

    fn select<G: Rng>(&self, rng: &mut G, stats: &Exp3Stats<R>) -> Outcome<R> {
        let row_forecast = self.forecast(&stats.row_gains);
        let col_forecast = self.forecast(&stats.col_gains);
        let row_idx = sample_pdf(rng, &row_forecast);
        let col_idx = sample_pdf(rng, &col_forecast);
        Outcome {
            row_idx,
            col_idx,
            value: Value::default(),
            row_mu: row_forecast[row_idx],
            col_mu: col_forecast[col_idx],
        }
    }

    fn update_matrix_stats(&self, stats: &mut Exp3Stats<R>, outcome: &Outcome<R>) {
        stats.visits += 1;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
        stats.value_total += outcome.value.row();

        stats.row_gains[outcome.row_idx] += outcome.value.row() / outcome.row_mu;
        if stats.row_gains[outcome.row_idx] >= R::zero() {
            let shift = stats.row_gains[outcome.row_idx];
            for gain in &mut stats.row_gains {
                *gain -= shift;
            }
        }
        stats.col_gains[outcome.col_idx] += outcome.value.col() / outcome.col_mu;
        if stats.col_gains[outcome.col_idx] >= R::zero() {
            let shift = stats.col_gains[outcome.col_idx];
            for gain in &mut stats.col_gains {
                *gain -= shift;
            }
        }
    }

    fn update_chance_stats(&self, _stats: &mut (), _outcome: &Outcome<R>) {}

    fn empirical_strategies(&self, stats: &Exp3Stats<R>) -> (Vec<R>, Vec<R>) {
        (power_norm(&stats.row_visits), power_norm(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &Exp3Stats<R>) -> Value<R> {
        if stats.visits == 0 {
            return Value::default();
        }
        #[allow(clippy::cast_possible_wrap)]
        let visits = R::from_fraction(stats.visits as i64, 1);
        Value::new(stats.value_total / visits)
    }

    /// The exploration forecast itself, not the empirical frequencies.
    fn policy(&self, stats: &Exp3Stats<R>) -> (Vec<R>, Vec<R>) {
        (self.forecast(&stats.row_gains), self.forecast(&stats.col_gains))
    }
}
