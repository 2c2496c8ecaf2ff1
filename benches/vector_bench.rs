//! State-vector algebra hot paths: `causally_before`, `vdiff`, and
//! `least_common_successor` run on every `translate`/`transform_request`
//! call, once per known participant, so their cost sets the floor for
//! everything above them.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use adopted::vector::{ParticipantId, StateVector};

fn dense_vector(n: u32) -> StateVector<ParticipantId> {
    let mut v = StateVector::new();
    for i in 1..=n {
        v.set(ParticipantId::new(i), u64::from(i));
    }
    v
}

fn bench_causally_before(c: &mut Criterion) {
    let mut group = c.benchmark_group("causally_before");
    for &n in &[4u32, 16, 64] {
        let a = dense_vector(n);
        let mut b = dense_vector(n);
        for i in 1..=n {
            b.add(ParticipantId::new(i), 1);
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bencher, _| {
            bencher.iter(|| black_box(&a).causally_before(black_box(&b)));
        });
    }
    group.finish();
}

fn bench_vdiff(c: &mut Criterion) {
    let mut group = c.benchmark_group("vdiff");
    for &n in &[4u32, 16, 64] {
        let a = dense_vector(n);
        let mut b = dense_vector(n);
        for i in 1..=n {
            b.add(ParticipantId::new(i), 1);
        }
        let ids: Vec<_> = (1..=n).map(ParticipantId::new).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bencher, _| {
            bencher.iter(|| black_box(&a).vdiff(black_box(&b), ids.iter().copied()));
        });
    }
    group.finish();
}

fn bench_least_common_successor(c: &mut Criterion) {
    let mut group = c.benchmark_group("least_common_successor");
    for &n in &[4u32, 16, 64] {
        let a = dense_vector(n);
        let b = dense_vector(n);
        let ids: Vec<_> = (1..=n).map(ParticipantId::new).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bencher, _| {
            bencher.iter(|| black_box(&a).least_common_successor(black_box(&b), ids.iter().copied()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_causally_before, bench_vdiff, bench_least_common_successor);
criterion_main!(benches);
