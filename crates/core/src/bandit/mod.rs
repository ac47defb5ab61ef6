//! Bandit policies driving tree-bandit search.
//!
//! A bandit owns the per-node statistics layout and the
//! `expand → select → update` protocol. The searches stay generic over this
//! trait and keep the inner loops monomorphic.

mod exp3;
mod ucb;
mod uniform;

use rand::Rng;

pub use exp3::{Exp3, Exp3Stats};
pub use ucb::{Ucb, UcbStats};
pub use uniform::{UniformBandit, UniformStats};

use crate::model::ModelOutput;
use crate::num::{Scalar, Value};

/// One selection at a matrix node, filled in by `select` and completed with
/// the back-propagated value before `update`.
#[derive(Debug, Clone)]
pub struct Outcome<R: Scalar> {
    pub row_idx: usize,
    pub col_idx: usize,
    pub value: Value<R>,
    /// Probability with which the row action was selected.
    pub row_mu: R,
    /// Probability with which the column action was selected.
    pub col_mu: R,
}

impl<R: Scalar> Default for Outcome<R> {
    fn default() -> Self {
        Self {
            row_idx: 0,
            col_idx: 0,
            value: Value::default(),
            row_mu: R::one(),
            col_mu: R::one(),
        }
    }
}

/// Bandit policy over the joint action space of a matrix node.
pub trait Bandit<R: Scalar>: Send + Sync {
    type MatrixStats: Default + Send;
    type ChanceStats: Default + Send;

    /// Initialize fresh statistics for a `rows × cols` node.
    fn expand(
        &self,
        rows: usize,
        cols: usize,
        output: &ModelOutput<R>,
        stats: &mut Self::MatrixStats,
    );

    /// Pick a joint action; records the selection probabilities.
    fn select<G: Rng>(&self, rng: &mut G, stats: &Self::MatrixStats) -> Outcome<R>;

    fn update_matrix_stats(&self, stats: &mut Self::MatrixStats, outcome: &Outcome<R>);

    fn update_chance_stats(&self, stats: &mut Self::ChanceStats, outcome: &Outcome<R>);

    /// Visit-count-normalized strategies.
    fn empirical_strategies(&self, stats: &Self::MatrixStats) -> (Vec<R>, Vec<R>);

    /// Average back-propagated value, guarded against zero visits.
    fn empirical_value(&self, stats: &Self::MatrixStats) -> Value<R>;

    /// Current exploration policy; defaults to the empirical strategies.
    fn policy(&self, stats: &Self::MatrixStats) -> (Vec<R>, Vec<R>) {
        self.empirical_strategies(stats)
    }
}

/// Sample an index from a probability forecast.
pub(crate) fn sample_pdf<R: Scalar, G: Rng>(rng: &mut G, pdf: &[R]) -> usize {
    debug_assert!(!pdf.is_empty());
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (idx, &p) in pdf.iter().enumerate() {
        cumulative += p.to_f64();
        if draw < cumulative {
            return idx;
        }
    }
    pdf.len() - 1
}

/// Normalize visit counts into a strategy; uniform when nothing was visited.
pub(crate) fn power_norm<R: Scalar>(visits: &[u32]) -> Vec<R> {
    let total: u64 = visits.iter().map(|&v| u64::from(v)).sum();
    if total == 0 {
        let k = i64::try_from(visits.len().max(1)).unwrap_or(i64::MAX);
        vec![R::from_fraction(1, k); visits.len()]
    } else {
        let total = i64::try_from(total).unwrap_or(i64::MAX);
        visits
            .iter()
            .map(|&v| R::from_fraction(i64::from(v), total))
            .collect()
    }
}
