//! Turn loop benchmarks for lch_core.
//!
//! Run with: `cargo bench -p lch_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lch_core::generator::generate_team_actions;
use lch_core::unit::TeamId;
use lch_test_utils::fixtures::{forest, reference_game, reference_roster};

/// Candidate generation for a full squad, cold and warm caches.
pub fn generation_benchmark(c: &mut Criterion) {
    let roster = {
        let bf = forest(20, 12, 1);
        reference_roster(&bf)
    };

    c.bench_function("generate_team_actions_cold", |b| {
        b.iter_batched(
            || forest(20, 12, 1),
            |mut bf| black_box(generate_team_actions(&mut bf, &roster, TeamId::One)),
            criterion::BatchSize::SmallInput,
        );
    });

    let mut warm = forest(20, 12, 1);
    c.bench_function("generate_team_actions_warm", |b| {
        b.iter(|| black_box(generate_team_actions(&mut warm, &roster, TeamId::One)));
    });
}

/// A complete reference game.
pub fn game_benchmark(c: &mut Criterion) {
    c.bench_function("reference_game", |b| {
        b.iter_batched(
            || reference_game(7),
            |mut game| black_box(game.run()),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, generation_benchmark, game_benchmark);
criterion_main!(benches);
