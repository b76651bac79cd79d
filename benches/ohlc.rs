// benches/ohlc.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xfeed::ohlc::OHLCGroup;

/// Folds one tick every second for an hour, the steady-state shape a live
/// feed produces once all 8 resolutions have warmed up.
pub fn bench_fold_steady_state(c: &mut Criterion) {
    c.bench_function("ohlc/fold/one_hour_of_one_second_ticks", |b| {
        b.iter(|| {
            let mut group = OHLCGroup::new();
            let mut value: u64 = 6_500_000;
            for ts in 0..3600u64 {
                value = value.wrapping_add(ts % 7).wrapping_sub(ts % 5);
                group.fold(black_box(value), black_box(2), black_box(ts));
            }
            group
        })
    });
}

/// Folds a single tick that requires rescaling every bar currently open
/// across all 8 resolutions (the `rescale_bar_in_place` path).
pub fn bench_fold_with_rescale(c: &mut Criterion) {
    c.bench_function("ohlc/fold/rescale_all_resolutions", |b| {
        b.iter(|| {
            let mut group = OHLCGroup::new();
            group.fold(black_box(65_000), black_box(0), black_box(0));
            group.fold(black_box(650_001), black_box(1), black_box(1));
            group
        })
    });
}

criterion_group!(ohlc_benches, bench_fold_steady_state, bench_fold_with_rescale);
criterion_main!(ohlc_benches);
