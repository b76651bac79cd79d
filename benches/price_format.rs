// benches/price_format.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xfeed::price::{format_price, parse_decimal_str};

pub fn bench_parse_decimal_str(c: &mut Criterion) {
    let samples = ["65000.1", "0.0005", "5", "123456789.987654321"];

    c.bench_function("price/parse_decimal_str", |b| {
        b.iter(|| {
            for s in black_box(&samples) {
                let _ = parse_decimal_str(s).unwrap();
            }
        })
    });
}

pub fn bench_format_price(c: &mut Criterion) {
    let samples = [(650_001u64, 1u64), (5u64, 4u64), (65_000u64, 0u64)];

    c.bench_function("price/format_price", |b| {
        b.iter(|| {
            for &(value, scale) in black_box(&samples) {
                let _ = format_price(value, scale);
            }
        })
    });
}

criterion_group!(price_format_benches, bench_parse_decimal_str, bench_format_price);
criterion_main!(price_format_benches);
