use thiserror::Error;

/// Errors reported by the search algorithms and the matrix-game solver.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("empty {side} action set at a non-terminal state")]
    EmptyActionSet { side: &'static str },

    #[error("model policy length mismatch: expected {expected}, got {actual}")]
    PolicyLengthMismatch { expected: usize, actual: usize },

    #[error("degenerate payoff matrix: {rows}x{cols}")]
    DegenerateMatrix { rows: usize, cols: usize },

    #[error("no equilibrium found for {rows}x{cols} matrix")]
    NoEquilibrium { rows: usize, cols: usize },
}
