//! Benchmark of random forest fitting and prediction
//!
//! Run with: cargo bench --bench forest_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand::SeedableRng;

use ecomlens::pipeline::forest::{ForestConfig, MaxFeatures, RandomForest};

/// Regression data where the first two features carry the signal
fn generate_regression_data(n_rows: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let x: Vec<Vec<f64>> = (0..n_rows)
        .map(|_| (0..n_features).map(|_| rng.gen::<f64>() * 100.0).collect())
        .collect();
    let y: Vec<f64> = x
        .iter()
        .map(|row| {
            let step = if row[1] > 50.0 { 40.0 } else { 0.0 };
            2.0 * row[0] + step + rng.gen::<f64>() * 10.0
        })
        .collect();
    (x, y)
}

/// Fit time for dataset sizes typical of monthly series and customer tables
fn benchmark_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);

    let sizes = [(20, 11), (1_000, 8), (10_000, 8)];
    for (n_rows, n_features) in sizes {
        let (x, y) = generate_regression_data(n_rows, n_features, 42);
        group.throughput(Throughput::Elements(n_rows as u64));

        for max_features in [MaxFeatures::All, MaxFeatures::Sqrt] {
            let config = ForestConfig {
                n_trees: 50,
                max_depth: Some(10),
                max_features,
                ..ForestConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", max_features), format!("{}x{}", n_rows, n_features)),
                &config,
                |b, config| {
                    b.iter(|| RandomForest::fit(black_box(&x), black_box(&y), black_box(config)));
                },
            );
        }
    }

    group.finish();
}

/// Effect of the ensemble size on fit time
fn benchmark_tree_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_count_impact");
    group.sample_size(10);

    let (x, y) = generate_regression_data(2_000, 8, 7);
    for n_trees in [10, 50, 100, 200] {
        let config = ForestConfig {
            n_trees,
            max_depth: Some(10),
            min_samples_leaf: 5,
            max_features: MaxFeatures::Sqrt,
            ..ForestConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(n_trees), &config, |b, config| {
            b.iter(|| RandomForest::fit(black_box(&x), black_box(&y), black_box(config)));
        });
    }

    group.finish();
}

/// Prediction with per-tree spread, as used for forecast intervals
fn benchmark_predict(c: &mut Criterion) {
    let (x, y) = generate_regression_data(2_000, 8, 11);
    let config = ForestConfig {
        n_trees: 100,
        max_depth: Some(10),
        ..ForestConfig::default()
    };
    let forest = RandomForest::fit(&x, &y, &config).expect("forest fits on synthetic data");

    c.bench_function("forest_predict_with_spread", |b| {
        b.iter(|| {
            for row in x.iter().take(100) {
                black_box(forest.predict_with_spread(black_box(row)));
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_forest_fit,
    benchmark_tree_counts,
    benchmark_predict
);
criterion_main!(benches);
