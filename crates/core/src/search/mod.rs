//! The search algorithms: full traversal, the two alpha-beta double-oracle
//! variants, and bandit-driven tree search.

pub mod alpha_beta;
pub mod full_traversal;
pub mod sampled_alpha_beta;
pub mod tree_bandit;
pub mod tree_bandit_threaded;

pub use alpha_beta::{AlphaBeta, AlphaBetaChanceStats, AlphaBetaMatrixStats};
pub use full_traversal::{
    FullTraversal, SharedMatrixNode, TraversalChanceStats, TraversalMatrixStats,
};
pub use sampled_alpha_beta::{
    Branch, CellData, DepthReport, SampledAlphaBeta, SampledAlphaBetaConfig, SampledNode,
};
pub use tree_bandit::{Backprop, TreeBandit, TreeBanditConfig};
pub use tree_bandit_threaded::{SyncMatrixNode, TreeBanditThreaded};
