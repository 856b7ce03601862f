use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tonetap_core::synth::synthesize;

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");

    group.bench_function("1s@8k no tap", |b| {
        b.iter(|| synthesize(black_box(500.0), black_box(0), 8000, 8000))
    });

    group.bench_function("1s@8k max tap", |b| {
        b.iter(|| synthesize(black_box(500.0), black_box(441), 8000, 8000))
    });

    group.bench_function("1s@48k max tap", |b| {
        b.iter(|| synthesize(black_box(4000.0), black_box(441), 48_000, 48_000))
    });

    group.finish();
}

criterion_group!(benches, bench_synthesize);
criterion_main!(benches);
