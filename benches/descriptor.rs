use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mq_descriptor::{compute_default_layout, QueueConfig, StrictDescriptor};

fn bench_layout(c: &mut Criterion) {
    c.bench_function("compute_default_layout", |b| {
        b.iter(|| compute_default_layout(black_box(64 * 1024), black_box(8), black_box(true)))
    });
}

fn bench_duplicate(c: &mut Criterion) {
    let config = QueueConfig::with_capacity(1024, 8).with_region_name("bench_duplicate");
    let desc = StrictDescriptor::allocate(&config).expect("allocate descriptor");

    c.bench_function("duplicate", |b| {
        b.iter(|| desc.duplicate().expect("duplicate descriptor"))
    });
}

criterion_group!(benches, bench_layout, bench_duplicate);
criterion_main!(benches);
