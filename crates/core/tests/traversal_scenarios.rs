//! End-to-end full-traversal scenarios on the test states.

use smg_solver_core::game::{MatrixGameState, MoldState};
use smg_solver_core::model::MonteCarloModel;
use smg_solver_core::nash::{exploitability, SupportEnumeration};
use smg_solver_core::num::{Rational, Value};
use smg_solver_core::search::{
    FullTraversal, SharedMatrixNode, TraversalChanceStats, TraversalMatrixStats,
};
use smg_solver_core::tree::{dense, MatrixNodeOps};
use test_macros::timed_test;

type Root<R> = dense::MatrixNode<u8, u8, TraversalMatrixStats<R>, TraversalChanceStats<R, u8>>;

/// One row action, one column action, payoff 1/2: the tree is a root plus a
/// single terminal child and both strategies are pure.
#[timed_test]
fn one_by_one_single_step_game() {
    let state: MatrixGameState<Rational> =
        MatrixGameState::single(Value::new(Rational::new(1, 2)));
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);
    let mut root: Root<Rational> = dense::MatrixNode::default();

    let (value, _) = search.run(1, &state, &mut model, &mut root).unwrap();

    assert_eq!(value, Rational::new(1, 2));
    assert_eq!(root.stats().payoff.row(), Rational::new(1, 2));
    assert_eq!(root.stats().row_solution, vec![Rational::new(1, 1)]);
    assert_eq!(root.stats().col_solution, vec![Rational::new(1, 1)]);
}

#[timed_test]
fn matching_pennies_solves_to_one_half() {
    let state: MatrixGameState<Rational> = MatrixGameState::matching_pennies();
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);
    let mut root: Root<Rational> = dense::MatrixNode::default();

    let (value, _) = search.run(1, &state, &mut model, &mut root).unwrap();

    let half = Rational::new(1, 2);
    assert_eq!(value, half);
    assert_eq!(root.stats().row_solution, vec![half, half]);
    assert_eq!(root.stats().col_solution, vec![half, half]);
}

#[timed_test]
fn mold_tree_size_three_counts_ninety_one_nodes() {
    let state: MoldState<Rational> = MoldState::new(3, 2);
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);
    let mut root: Root<Rational> = dense::MatrixNode::default();

    let (value, _) = search.run(4, &state, &mut model, &mut root).unwrap();

    assert_eq!(value, Rational::new(0, 1));
    // Root, 3x3 children, 3x3 grandchildren per child.
    assert_eq!(root.count_matrix_nodes(), 1 + 9 + 81);
}

#[timed_test]
fn value_is_consistent_with_the_solution_pair() {
    let state: MatrixGameState<Rational> = MatrixGameState::from_fractions(&[
        &[(1, 1), (0, 1), (1, 2)],
        &[(0, 1), (1, 1), (1, 2)],
        &[(1, 4), (3, 4), (1, 2)],
    ]);
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);
    let mut root: Root<Rational> = dense::MatrixNode::default();
    let (value, _) = search.run(1, &state, &mut model, &mut root).unwrap();

    let stats = root.stats();
    // sum_ij x_i y_j M[i][j] == value, exactly.
    let mut accumulated = Rational::new(0, 1);
    for i in 0..3 {
        for j in 0..3 {
            accumulated += stats.row_solution[i]
                * stats.col_solution[j]
                * stats.nash_payoff_matrix.get(i, j).row();
        }
    }
    assert_eq!(accumulated, value);
    assert_eq!(
        exploitability(
            &stats.nash_payoff_matrix,
            &stats.row_solution,
            &stats.col_solution
        ),
        Rational::new(0, 1)
    );
}

#[timed_test]
fn repeat_runs_build_identical_trees() {
    let state: MoldState<Rational> = MoldState::new(2, 3);
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);

    let mut first: Root<Rational> = dense::MatrixNode::default();
    let mut second: Root<Rational> = dense::MatrixNode::default();
    search.run(4, &state, &mut model, &mut first).unwrap();
    search.run(4, &state, &mut model, &mut second).unwrap();

    assert_eq!(first.stats().payoff, second.stats().payoff);
    assert_eq!(first.stats().nash_payoff_matrix, second.stats().nash_payoff_matrix);
    assert_eq!(first.stats().row_solution, second.stats().row_solution);
    assert_eq!(first.count_matrix_nodes(), second.count_matrix_nodes());
}

#[timed_test(10_000)]
fn threaded_traversal_agrees_with_serial() {
    let state: MoldState<Rational> = MoldState::new(3, 2);
    let search = FullTraversal::new(SupportEnumeration);
    let mut model = MonteCarloModel::new(0);

    let mut serial: Root<Rational> = dense::MatrixNode::default();
    let (serial_value, _) = search.run(4, &state, &mut model, &mut serial).unwrap();

    for threads in [1, 2, 8] {
        let shared = SharedMatrixNode::default();
        let (threaded_value, _) = search
            .run_threaded(4, &state, &MonteCarloModel::new(0), &shared, threads)
            .unwrap();
        assert_eq!(serial_value, threaded_value, "{threads} threads diverged");
        assert_eq!(shared.count_matrix_nodes(), serial.count_matrix_nodes());
        assert_eq!(shared.row_solution(), serial.stats().row_solution);
    }
}
