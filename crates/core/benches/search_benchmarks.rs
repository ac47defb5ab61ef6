//! Throughput benchmarks for the search drivers on the mold tree.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use smg_solver_core::bandit::{Exp3, Exp3Stats, UniformBandit, UniformStats};
use smg_solver_core::game::MoldState;
use smg_solver_core::model::MonteCarloModel;
use smg_solver_core::nash::SupportEnumeration;
use smg_solver_core::search::{FullTraversal, TraversalChanceStats, TraversalMatrixStats, TreeBandit};
use smg_solver_core::tree::dense;

type Exp3Root = dense::MatrixNode<u8, u8, Exp3Stats<f64>, ()>;
type UniformRoot = dense::MatrixNode<u8, u8, UniformStats<f64>, ()>;
type TraversalRoot =
    dense::MatrixNode<u8, u8, TraversalMatrixStats<f64>, TraversalChanceStats<f64, u8>>;

fn tree_bandit_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_bandit");
    for depth in [4_usize, 8] {
        group.bench_with_input(BenchmarkId::new("exp3_mold", depth), &depth, |b, &depth| {
            let state: MoldState<f64> = MoldState::new(3, depth);
            let search = TreeBandit::new(Exp3::new(0.1));
            let mut model = MonteCarloModel::new(1);
            let mut rng = SmallRng::seed_from_u64(1);
            b.iter(|| {
                let mut root = Exp3Root::default();
                search
                    .run_for_iterations(1_000, &mut rng, &state, &mut model, &mut root)
                    .unwrap()
            });
        });
        group.bench_with_input(
            BenchmarkId::new("uniform_mold", depth),
            &depth,
            |b, &depth| {
                let state: MoldState<f64> = MoldState::new(3, depth);
                let search = TreeBandit::new(UniformBandit);
                let mut model = MonteCarloModel::new(1);
                let mut rng = SmallRng::seed_from_u64(1);
                b.iter(|| {
                    let mut root = UniformRoot::default();
                    search
                        .run_for_iterations(1_000, &mut rng, &state, &mut model, &mut root)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn full_traversal_mold(c: &mut Criterion) {
    c.bench_function("full_traversal/mold_3x3_depth_2", |b| {
        let state: MoldState<f64> = MoldState::new(3, 2);
        let search = FullTraversal::new(SupportEnumeration);
        let mut model = MonteCarloModel::new(1);
        b.iter(|| {
            let mut root = TraversalRoot::default();
            search.run(3, &state, &mut model, &mut root).unwrap()
        });
    });
}

criterion_group!(benches, tree_bandit_iterations, full_traversal_mold);
criterion_main!(benches);
