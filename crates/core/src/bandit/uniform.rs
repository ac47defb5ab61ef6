//! Uniform selection baseline, mostly useful for benchmarking the tree and
//! state machinery without bandit overhead.

use rand::Rng;

use super::{power_norm, Bandit, Outcome};
use crate::model::ModelOutput;
use crate::num::{Scalar, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct UniformBandit;

#[derive(Debug, Clone, Default)]
pub struct UniformStats<R: Scalar> {
    pub rows: usize,
    pub cols: usize,
    pub row_visits: Vec<u32>,
    pub col_visits: Vec<u32>,
    pub visits: u64,
    pub value_total: R,
}

impl<R: Scalar> Bandit<R> for UniformBandit {
    type MatrixStats = UniformStats<R>;
    type ChanceStats = ();

    fn expand(
        &self,
        rows: usize,
        cols: usize,
        _output: &ModelOutput<R>,
        stats: &mut UniformStats<R>,
    ) {
        stats.rows = rows;
        stats.cols = cols;
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
        stats.visits = 0;
        stats.value_total = R::zero();
    }

    fn select<G: Rng>(&self, rng: &mut G, stats: &UniformStats<R>) -> Outcome<R> {
        let rows = i64::try_from(stats.rows.max(1)).unwrap_or(i64::MAX);
        let cols = i64::try_from(stats.cols.max(1)).unwrap_or(i64::MAX);
        Outcome {
            row_idx: rng.gen_range(0..stats.rows),
            col_idx: rng.gen_range(0..stats.cols),
            value: Value::default(),
            row_mu: R::from_fraction(1, rows),
            col_mu: R::from_fraction(1, cols),
        }
    }

    fn update_matrix_stats(&self, stats: &mut UniformStats<R>, outcome: &Outcome<R>) {
        stats.visits += 1;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
        stats.value_total += outcome.value.row();
    }

    fn update_chance_stats(&self, _stats: &mut (), _outcome: &Outcome<R>) {}

    fn empirical_strategies(&self, stats: &UniformStats<R>) -> (Vec<R>, Vec<R>) {
        (power_norm(&stats.row_visits), power_norm(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &UniformStats<R>) -> Value<R> {
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
    fn selection_covers_the_grid() {
        let bandit = UniformBandit;
        let mut stats: UniformStats<f64> = UniformStats::default();
        <UniformBandit as Bandit<f64>>::expand(&bandit, 3, 3, &ModelOutput::default(), &mut stats);
        let mut rng = SmallRng::seed_from_u64(4);
        let mut cells = std::collections::HashSet::new();
        for _ in 0..200 {
            let outcome = bandit.select(&mut rng, &stats);
            cells.insert((outcome.row_idx, outcome.col_idx));
        }
        assert_eq!(cells.len(), 9);
    }
}
