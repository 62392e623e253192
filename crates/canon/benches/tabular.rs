use canon::{
    canonicalize, tabular, CanonConfig, StateSpaceKind, TableSampler, TabularReward,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use std::sync::Arc;

fn random_table(n: usize, rng: &mut fastrand::Rng) -> Array3<f64> {
    Array3::from_shape_fn((n, 4, n), |_| rng.f64() - 0.5)
}

fn bench_potential_fit(c: &mut Criterion) {
    let mut rng = fastrand::Rng::with_seed(0);
    let reward = random_table(64, &mut rng);
    let coverage = Array3::ones((64, 4, 64));
    c.bench_function("fit_potential_tabular 64x4", |b| {
        b.iter(|| {
            tabular::fit_potential_tabular(black_box(&reward), &coverage, 0.99, 1e-8).unwrap()
        });
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut rng = fastrand::Rng::with_seed(1);
    let model = Arc::new(TabularReward::new(random_table(25, &mut rng)).unwrap());
    let mut sampler = TableSampler::uniform(25, 4).unwrap();
    let config = CanonConfig::default();
    c.bench_function("canonicalize 25x4 tabular", |b| {
        b.iter(|| {
            canonicalize(model.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap()
        });
    });
}

criterion_group!(benches, bench_potential_fit, bench_canonicalize);
criterion_main!(benches);
