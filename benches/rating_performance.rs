//! Performance benchmarks for rating calculations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quiz_duel::config::RatingConfig;
use quiz_duel::rating::EloEngine;
use quiz_duel::types::MatchOutcome;

fn bench_expected_score(c: &mut Criterion) {
    let engine = EloEngine::new(RatingConfig::default()).unwrap();

    c.bench_function("elo_expected_score", |b| {
        b.iter(|| {
            let (ea, eb) = engine.expected(black_box(1200), black_box(1450));
            black_box(ea + eb)
        })
    });
}

fn bench_settlement(c: &mut Criterion) {
    let engine = EloEngine::new(RatingConfig::default()).unwrap();

    c.bench_function("elo_settle_win", |b| {
        b.iter(|| {
            engine.settle(
                black_box(1200),
                black_box(1450),
                black_box(MatchOutcome::Win),
            )
        })
    });

    c.bench_function("elo_settle_draw", |b| {
        b.iter(|| {
            engine.settle(
                black_box(1200),
                black_box(1200),
                black_box(MatchOutcome::Draw),
            )
        })
    });
}

fn bench_settlement_sweep(c: &mut Criterion) {
    let engine = EloEngine::new(RatingConfig::default()).unwrap();

    // A full sweep over a realistic ladder of rating gaps.
    c.bench_function("elo_settle_ladder_sweep", |b| {
        b.iter(|| {
            let mut acc = 0i32;
            for gap in (0..800).step_by(25) {
                let deltas = engine.settle(1200, 1200 + gap, MatchOutcome::Win);
                acc += deltas.delta_a - deltas.delta_b;
            }
            black_box(acc)
        })
    });
}

criterion_group!(
    benches,
    bench_expected_score,
    bench_settlement,
    bench_settlement_sweep
);
criterion_main!(benches);
