#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Search algorithms for two-player zero-sum simultaneous-move stochastic
//! games.
//!
//! The crate couples a shared tree representation with a family of
//! interchangeable solvers:
//!
//! - `search::full_traversal`: exhaustive expansion with per-node
//!   matrix-game solving, serial or multi-threaded.
//! - `search::alpha_beta` / `search::sampled_alpha_beta`: simultaneous-move
//!   alpha-beta with double oracle, over enumerable or sampled chance.
//! - `search::tree_bandit`: MCTS-style iteration driven by a bandit policy
//!   (`bandit::Exp3`, `bandit::Ucb`, `bandit::UniformBandit`).
//!
//! Games plug in through the `game::State` contract, leaf evaluation through
//! `model::Model`, and sub-matrix equilibria through `nash::MatrixSolver`.
//! Everything is generic over `num::Scalar`: `f64` for speed, `num::Rational`
//! for exact arithmetic.

pub mod bandit;
pub mod config;
pub mod error;
pub mod game;
pub mod model;
pub mod nash;
pub mod num;
pub mod search;
pub mod tree;

pub use error::SearchError;
pub use num::{Matrix, Prob, Rational, Scalar, Value};
