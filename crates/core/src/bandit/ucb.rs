//! Decoupled UCB1 over the two action sets.
//!
//! Each side keeps per-action means and visit counts; selection maximizes
//! `mean + c·sqrt(ln N / n)` independently for the row (maximizing) and
//! column (minimizing, on derived column values) players. Unvisited actions
//! are tried first. Selection is deterministic, so `mu = 1`.

use rand::Rng;

use super::{power_norm, Bandit, Outcome};
use crate::model::ModelOutput;
use crate::num::{Scalar, Value};

#[derive(Debug, Clone)]
pub struct Ucb {
    exploration: f64,
}

impl Ucb {
    #[must_use]
    pub fn new(exploration: f64) -> Self {
        Self { exploration }
    }
}

impl Default for Ucb {
    fn default() -> Self {
        Self::new(std::f64::consts::SQRT_2)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UcbStats<R: Scalar> {
    pub row_value_sums: Vec<R>,
    pub col_value_sums: Vec<R>,
    pub row_visits: Vec<u32>,
    pub col_visits: Vec<u32>,
    pub visits: u64,
    pub value_total: R,
}

fn pick_arm<R: Scalar>(sums: &[R], visits: &[u32], total: u64, exploration: f64) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    #[allow(clippy::cast_precision_loss)]
    let log_total = (total.max(1) as f64).ln();
    for (idx, (&sum, &n)) in sums.iter().zip(visits).enumerate() {
        let score = if n == 0 {
            f64::INFINITY
        } else {
            sum.to_f64() / f64::from(n) + exploration * (log_total / f64::from(n)).sqrt()
        };
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }
    best
}

impl<R: Scalar> Bandit<R> for Ucb {
    type MatrixStats = UcbStats<R>;
    type ChanceStats = ();

    fn expand(&self, rows: usize, cols: usize, _output: &ModelOutput<R>, stats: &mut UcbStats<R>) {
        stats.row_value_sums = vec![R::zero(); rows];
        stats.col_value_sums = vec![R::zero(); cols];
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
        stats.visits = 0;
        stats.value_total = R::zero();
    }

    fn select<G: Rng>(&self, _rng: &mut G, stats: &UcbStats<R>) -> Outcome<R> {
        let row_idx = pick_arm(
            &stats.row_value_sums,
            &stats.row_visits,
            stats.visits,
            self.exploration,
        );
        let col_idx = pick_arm(
            &stats.col_value_sums,
            &stats.col_visits,
            stats.visits,
            self.exploration,
        );
        Outcome {
            row_idx,
            col_idx,
            value: Value::default(),
            row_mu: R::one(),
            col_mu: R::one(),
        }
    }

    fn update_matrix_stats(&self, stats: &mut UcbStats<R>, outcome: &Outcome<R>) {
        stats.visits += 1;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
        stats.value_total += outcome.value.row();
        stats.row_value_sums[outcome.row_idx] += outcome.value.row();
        stats.col_value_sums[outcome.col_idx] += outcome.value.col();
    }

    fn update_chance_stats(&self, _stats: &mut (), _outcome: &Outcome<R>) {}

    fn empirical_strategies(&self, stats: &UcbStats<R>) -> (Vec<R>, Vec<R>) {
        (power_norm(&stats.row_visits), power_norm(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &UcbStats<R>) -> Value<R> {
        if stats.visits == 0 {
            return Value::default();
        }
        #[allow(clippy::cast_possible_wrap)]
        let visits = R::from_fraction(stats.visits as i64, 1);
        Value::new(stats.value_total / visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use test_macros::timed_test;

    #[timed_test]
    fn unvisited_arms_are_tried_first() {
        let bandit = Ucb::default();
        let mut stats: UcbStats<f64> = UcbStats::default();
        <Ucb as Bandit<f64>>::expand(&bandit, 2, 2, &ModelOutput::default(), &mut stats);
        let mut rng = SmallRng::seed_from_u64(0);
        let mut seen_rows = std::collections::HashSet::new();
        for _ in 0..2 {
            let mut outcome = bandit.select(&mut rng, &stats);
            seen_rows.insert(outcome.row_idx);
            outcome.value = Value::new(0.5);
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        assert_eq!(seen_rows.len(), 2);
    }

    #[timed_test]
    fn row_player_gravitates_to_the_better_arm() {
        let bandit = Ucb::new(0.05);
        let mut stats: UcbStats<f64> = UcbStats::default();
        <Ucb as Bandit<f64>>::expand(&bandit, 2, 1, &ModelOutput::default(), &mut stats);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..300 {
            let mut outcome = bandit.select(&mut rng, &stats);
            // Row action 1 pays 0.9, row action 0 pays 0.1.
            outcome.value = Value::new(if outcome.row_idx == 1 { 0.9 } else { 0.1 });
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        assert!(stats.row_visits[1] > stats.row_visits[0] * 3);
    }
}
