//! Tests for the monthly demand forecast and the random forest behind it

use chrono::{Datelike, NaiveDate};
use ecomlens::pipeline::forecast::{forecast_demand, monthly_series, ForecastConfig};
use ecomlens::pipeline::forest::{ForestConfig, MaxFeatures, RandomForest};
use ecomlens::pipeline::records::{Order, OrderItem};
use ecomlens::pipeline::DataError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[path = "common/mod.rs"]
mod common;

use common::{features, item, monthly_orders, order};

/// `months` consecutive months starting January 2016 with a rising trend and
/// a November spike; `skip` leaves one month without orders
fn history(months: u32, skip: Option<u32>) -> (Vec<Order>, Vec<OrderItem>) {
    let mut orders = Vec::new();
    let mut items = Vec::new();
    let start = NaiveDate::from_ymd_opt(2016, 1, 10).unwrap();
    for m in 0..months {
        if Some(m) == skip {
            continue;
        }
        let date = start + chrono::Months::new(m);
        let count = 3 + m as usize / 2 + if date.month() == 11 { 4 } else { 0 };
        for k in 0..count {
            let id = format!("o{}_{}", m, k);
            let purchased = format!("{} 12:00:00", date);
            orders.push(order(&id, &format!("c{}_{}", m, k), &purchased, None, &purchased));
            items.push(item(&id, 100.0 + m as f64 * 5.0, 10.0));
        }
    }
    (orders, items)
}

fn small_config() -> ForecastConfig {
    let mut config = ForecastConfig::default();
    config.forest.n_trees = 25;
    config
}

#[test]
fn test_short_history_is_insufficient() {
    // Twelve months leave only nine rows with three lags
    let (orders, items) = monthly_orders();
    let err = forecast_demand(&features(&orders, &items), &small_config()).unwrap_err();
    assert!(matches!(err, DataError::InsufficientData(_)), "got {:?}", err);
}

#[test]
fn test_thirteen_months_is_enough() {
    let (orders, items) = history(13, None);
    let report = forecast_demand(&features(&orders, &items), &small_config()).unwrap();
    assert_eq!(report.training_rows, 10);
    assert_eq!(report.revenue_model.train_rows, 8);
    assert_eq!(report.revenue_model.test_rows, 2);
}

#[test]
fn test_training_split_truncates() {
    // Twelve rows with full lags: 80% is 9.6, so nine rows train
    let (orders, items) = history(15, None);
    let report = forecast_demand(&features(&orders, &items), &small_config()).unwrap();
    assert_eq!(report.training_rows, 12);
    assert_eq!(report.revenue_model.train_rows, 9);
    assert_eq!(report.revenue_model.test_rows, 3);
    assert_eq!(report.orders_model.train_rows, 9);
}

#[test]
fn test_forecast_horizon_and_intervals() {
    let (orders, items) = history(24, None);
    let report = forecast_demand(&features(&orders, &items), &small_config()).unwrap();

    assert_eq!(report.forecast.len(), 3);
    // History ends December 2017
    let months: Vec<(i32, u32)> = report.forecast.iter().map(|p| (p.year, p.month)).collect();
    assert_eq!(months, vec![(2018, 1), (2018, 2), (2018, 3)]);

    for point in &report.forecast {
        assert!(point.revenue_lower <= point.revenue && point.revenue <= point.revenue_upper);
        assert!(point.orders_lower <= point.orders && point.orders <= point.orders_upper);
        assert!(point.orders_lower >= 0.0);
    }

    let importance: f64 = report.revenue_model.feature_importances.iter().map(|(_, v)| v).sum();
    assert!(importance == 0.0 || (importance - 1.0).abs() < 1e-9);
    assert!(report.revenue_model.metrics.is_some());
}

#[test]
fn test_gap_months_are_zero_filled() {
    let (orders, items) = history(15, Some(6));
    let series = monthly_series(&features(&orders, &items));
    assert_eq!(series.len(), 15);
    assert_eq!(series[6].orders, 0.0);
    assert_eq!(series[6].revenue, 0.0);
    assert_eq!((series[6].year, series[6].month), (2016, 7));
}

#[test]
fn test_forecast_is_deterministic_for_a_seed() {
    let (orders, items) = history(20, None);
    let order_features = features(&orders, &items);
    let a = forecast_demand(&order_features, &small_config()).unwrap();
    let b = forecast_demand(&order_features, &small_config()).unwrap();
    for (x, y) in a.forecast.iter().zip(&b.forecast) {
        assert_eq!(x.revenue, y.revenue);
        assert_eq!(x.orders, y.orders);
    }
}

fn noisy_linear(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<Vec<f64>> = (0..n)
        .map(|_| vec![rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0)])
        .collect();
    let y: Vec<f64> = x
        .iter()
        .map(|row| 3.0 * row[0] + rng.gen_range(-0.5..0.5))
        .collect();
    (x, y)
}

#[test]
fn test_forest_same_seed_same_predictions() {
    let (x, y) = noisy_linear(200, 1);
    let config = ForestConfig {
        n_trees: 20,
        max_features: MaxFeatures::Sqrt,
        ..ForestConfig::default()
    };
    let a = RandomForest::fit(&x, &y, &config).unwrap();
    let b = RandomForest::fit(&x, &y, &config).unwrap();
    for row in x.iter().take(20) {
        assert_eq!(a.predict(row), b.predict(row));
    }
    assert_eq!(a.n_trees(), 20);
    assert_eq!(a.n_features(), 2);
}

#[test]
fn test_forest_learns_the_informative_feature() {
    let (x, y) = noisy_linear(300, 2);
    let config = ForestConfig {
        n_trees: 30,
        max_depth: Some(6),
        ..ForestConfig::default()
    };
    let forest = RandomForest::fit(&x, &y, &config).unwrap();

    let importances = forest.feature_importances();
    assert!(importances[0] > importances[1], "got {:?}", importances);
    assert!(forest.max_depth() <= 6);

    let low = forest.predict(&[1.0, 5.0]);
    let high = forest.predict(&[9.0, 5.0]);
    assert!(high > low + 15.0, "low {} high {}", low, high);
}

#[test]
fn test_forest_rejects_bad_input() {
    let config = ForestConfig::default();
    assert!(RandomForest::fit(&[], &[], &config).is_err());
    assert!(RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &config).is_err());
    let no_trees = ForestConfig {
        n_trees: 0,
        ..ForestConfig::default()
    };
    assert!(RandomForest::fit(&[vec![1.0]], &[1.0], &no_trees).is_err());
}

#[test]
fn test_classifier_finds_the_minority_class() {
    // One row in ten is positive, marked by a high first feature
    let mut rng = StdRng::seed_from_u64(5);
    let x: Vec<Vec<f64>> = (0..400)
        .map(|i| {
            let signal = if i % 10 == 0 { 8.0 } else { 2.0 };
            vec![signal + rng.gen_range(-1.0..1.0), rng.gen_range(0.0..10.0)]
        })
        .collect();
    let labels: Vec<bool> = (0..400).map(|i| i % 10 == 0).collect();
    let config = ForestConfig {
        n_trees: 20,
        max_depth: Some(5),
        ..ForestConfig::default()
    };
    let forest = RandomForest::fit_classifier(&x, &labels, &config).unwrap();

    let positive = forest.predict(&[8.0, 5.0]);
    let negative = forest.predict(&[2.0, 5.0]);
    assert!(positive > 0.5, "Positive probability {}", positive);
    assert!(negative < 0.5, "Negative probability {}", negative);
    assert!((0.0..=1.0).contains(&positive));

    let importances = forest.feature_importances();
    assert!(importances[0] > importances[1], "got {:?}", importances);

    let again = RandomForest::fit_classifier(&x, &labels, &config).unwrap();
    assert_eq!(again.predict(&[5.0, 5.0]), forest.predict(&[5.0, 5.0]));
}

#[test]
fn test_classifier_needs_both_classes() {
    let x = vec![vec![1.0], vec![2.0], vec![3.0]];
    let err = RandomForest::fit_classifier(&x, &[true, true, true], &ForestConfig::default()).unwrap_err();
    assert!(matches!(err, DataError::InsufficientData(_)), "got {:?}", err);
}
