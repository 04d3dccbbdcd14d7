//! Customer analytics: segment summaries, CLV breakdowns, delivery impact
//! and a high-value customer classifier

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::error::{DataError, DataResult};
use super::features::{ClvCategory, CustomerMetrics, CustomerStatus, CustomerTable, DeliverySpeed};
use super::forest::{ForestConfig, MaxFeatures, RandomForest};
use super::rfm::{FrequencyBasis, Segment};
use super::stats::mean;

#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    pub share_pct: f64,
    pub total_revenue: f64,
    pub avg_revenue: f64,
    pub avg_recency_days: f64,
    pub avg_recency_score: f64,
    pub avg_frequency_score: f64,
    pub avg_monetary_score: f64,
}

/// One row per populated segment, largest first
pub fn segment_summary(customers: &[CustomerMetrics]) -> Vec<SegmentSummary> {
    let total = customers.len();
    let mut groups: BTreeMap<Segment, Vec<&CustomerMetrics>> = BTreeMap::new();
    for c in customers {
        groups.entry(c.segment).or_default().push(c);
    }

    let mut rows: Vec<SegmentSummary> = groups
        .into_iter()
        .map(|(segment, members)| {
            let n = members.len() as f64;
            let total_revenue: f64 = members.iter().map(|c| c.total_revenue).sum();
            let avg = |f: fn(&CustomerMetrics) -> f64| members.iter().map(|c| f(c)).sum::<f64>() / n;
            SegmentSummary {
                segment,
                customers: members.len(),
                share_pct: members.len() as f64 / total as f64 * 100.0,
                total_revenue,
                avg_revenue: total_revenue / n,
                avg_recency_days: avg(|c| c.recency_days as f64),
                avg_recency_score: avg(|c| f64::from(c.rfm.recency)),
                avg_frequency_score: avg(|c| f64::from(c.rfm.frequency)),
                avg_monetary_score: avg(|c| f64::from(c.rfm.monetary)),
            }
        })
        .collect();

    // Stable sort keeps segment order among equal counts
    rows.sort_by(|a, b| b.customers.cmp(&a.customers));
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct ClvGroup {
    pub label: String,
    pub customers: usize,
    pub avg_clv: f64,
    pub total_clv: f64,
    pub avg_revenue: f64,
    pub avg_delivery_days: Option<f64>,
    pub avg_reliability: Option<f64>,
}

fn clv_group(label: String, members: &[&CustomerMetrics]) -> ClvGroup {
    let n = members.len() as f64;
    let total_clv: f64 = members.iter().map(|c| c.clv).sum();
    let delivery: Vec<f64> = members.iter().filter_map(|c| c.avg_delivery_days).collect();
    let reliability: Vec<f64> = members.iter().filter_map(|c| c.delivery_reliability).collect();
    ClvGroup {
        label,
        customers: members.len(),
        avg_clv: total_clv / n,
        total_clv,
        avg_revenue: members.iter().map(|c| c.total_revenue).sum::<f64>() / n,
        avg_delivery_days: mean(&delivery),
        avg_reliability: mean(&reliability),
    }
}

pub fn clv_by_category(customers: &[CustomerMetrics]) -> Vec<ClvGroup> {
    ClvCategory::ALL
        .iter()
        .filter_map(|cat| {
            let members: Vec<&CustomerMetrics> =
                customers.iter().filter(|c| c.clv_category == *cat).collect();
            (!members.is_empty()).then(|| clv_group(cat.label().to_string(), &members))
        })
        .collect()
}

/// CLV per segment, highest average CLV first
pub fn clv_by_segment(customers: &[CustomerMetrics]) -> Vec<ClvGroup> {
    let mut groups: Vec<ClvGroup> = Segment::ALL
        .iter()
        .filter_map(|seg| {
            let members: Vec<&CustomerMetrics> =
                customers.iter().filter(|c| c.segment == *seg).collect();
            (!members.is_empty()).then(|| clv_group(seg.label().to_string(), &members))
        })
        .collect();
    groups.sort_by(|a, b| {
        b.avg_clv
            .partial_cmp(&a.avg_clv)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    groups
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverySpeedImpact {
    pub speed: DeliverySpeed,
    pub customers: usize,
    pub avg_revenue: f64,
    pub total_revenue: f64,
    pub avg_reliability: Option<f64>,
    pub avg_review_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryImpact {
    pub by_speed: Vec<DeliverySpeedImpact>,
    pub reliable_customers: usize,
    pub reliable_avg_revenue: f64,
    pub unreliable_customers: usize,
    pub unreliable_avg_revenue: f64,
}

/// Revenue and satisfaction by average delivery speed, and reliable
/// (every order on time) against unreliable customers
pub fn delivery_impact(customers: &[CustomerMetrics]) -> DeliveryImpact {
    let by_speed = DeliverySpeed::ALL
        .iter()
        .filter_map(|speed| {
            let members: Vec<&CustomerMetrics> = customers
                .iter()
                .filter(|c| c.avg_delivery_days.map(DeliverySpeed::from_days) == Some(*speed))
                .collect();
            if members.is_empty() {
                return None;
            }
            let total_revenue: f64 = members.iter().map(|c| c.total_revenue).sum();
            let reliability: Vec<f64> = members.iter().filter_map(|c| c.delivery_reliability).collect();
            let reviews: Vec<f64> = members.iter().filter_map(|c| c.avg_review_score).collect();
            Some(DeliverySpeedImpact {
                speed: *speed,
                customers: members.len(),
                avg_revenue: total_revenue / members.len() as f64,
                total_revenue,
                avg_reliability: mean(&reliability),
                avg_review_score: mean(&reviews),
            })
        })
        .collect();

    let (reliable, unreliable): (Vec<&CustomerMetrics>, Vec<&CustomerMetrics>) = customers
        .iter()
        .filter(|c| c.delivery_reliability.is_some())
        .partition(|c| c.delivery_reliability == Some(1.0));
    let avg_revenue = |group: &[&CustomerMetrics]| {
        mean(&group.iter().map(|c| c.total_revenue).collect::<Vec<_>>()).unwrap_or(0.0)
    };

    DeliveryImpact {
        by_speed,
        reliable_customers: reliable.len(),
        reliable_avg_revenue: avg_revenue(&reliable),
        unreliable_customers: unreliable.len(),
        unreliable_avg_revenue: avg_revenue(&unreliable),
    }
}

pub const HIGH_VALUE_FEATURES: [&str; 8] = [
    "recency_score",
    "frequency_score",
    "monetary_score",
    "avg_delivery_days",
    "delivery_reliability",
    "recency_days",
    "total_revenue",
    "avg_review_score",
];

/// Feature rows for the high-value classifier, in [`HIGH_VALUE_FEATURES`] order.
///
/// Delivery and review features are missing for customers without a delivered
/// or reviewed order; those cells take the mean of the column's present values.
pub fn high_value_features<'a>(customers: impl IntoIterator<Item = &'a CustomerMetrics>) -> Vec<Vec<f64>> {
    let raw: Vec<[Option<f64>; 8]> = customers
        .into_iter()
        .map(|c| {
            [
                Some(f64::from(c.rfm.recency)),
                Some(f64::from(c.rfm.frequency)),
                Some(f64::from(c.rfm.monetary)),
                c.avg_delivery_days,
                c.delivery_reliability,
                Some(c.recency_days as f64),
                Some(c.total_revenue),
                c.avg_review_score,
            ]
        })
        .collect();

    let column_means: Vec<f64> = (0..HIGH_VALUE_FEATURES.len())
        .map(|j| {
            let present: Vec<f64> = raw.iter().filter_map(|row| row[j]).collect();
            // An all-missing column is constant whatever the fill
            mean(&present).unwrap_or(0.0)
        })
        .collect();

    raw.iter()
        .map(|row| {
            row.iter()
                .zip(&column_means)
                .map(|(cell, fill)| cell.unwrap_or(*fill))
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HighValueModel {
    pub train_rows: usize,
    pub test_rows: usize,
    pub positive_rate: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub feature_importances: Vec<(String, f64)>,
}

/// Upper bound on customers used to fit the classifier
const MAX_MODEL_ROWS: usize = 20_000;

/// Stratified train/test split: `test_fraction` of each class is held out
fn stratified_split(labels: &[bool], test_fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [false, true] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        idx.shuffle(rng);
        let n_test = (idx.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Predict whether a customer is High Value or VIP from behavioural features.
///
/// A Gini classification forest with balanced class weights; a customer is
/// predicted positive when more than half of the probability mass says so.
pub fn train_high_value_model(
    customers: &[CustomerMetrics],
    n_trees: usize,
    seed: u64,
) -> DataResult<HighValueModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pool: Vec<&CustomerMetrics> = customers.iter().collect();
    if pool.len() > MAX_MODEL_ROWS {
        pool.shuffle(&mut rng);
        pool.truncate(MAX_MODEL_ROWS);
    }

    let labels: Vec<bool> = pool.iter().map(|c| c.clv_category.is_high_value()).collect();
    let positives = labels.iter().filter(|l| **l).count();
    if pool.len() < 10 || positives == 0 || positives == labels.len() {
        return Err(DataError::InsufficientData(
            "high-value model needs at least 10 customers with both classes present".to_string(),
        ));
    }

    let (train, test) = stratified_split(&labels, 0.2, &mut rng);
    let rows = high_value_features(pool.iter().copied());
    let x_train: Vec<Vec<f64>> = train.iter().map(|&i| rows[i].clone()).collect();
    let y_train: Vec<bool> = train.iter().map(|&i| labels[i]).collect();

    let config = ForestConfig {
        n_trees,
        max_depth: Some(10),
        min_samples_split: 10,
        min_samples_leaf: 5,
        max_features: MaxFeatures::Sqrt,
        seed,
    };
    let forest = RandomForest::fit_classifier(&x_train, &y_train, &config)?;

    let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
    for &i in &test {
        let predicted = forest.predict(&rows[i]) > 0.5;
        let actual = labels[i];
        if predicted == actual {
            correct += 1;
        }
        match (predicted, actual) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            _ => {}
        }
    }
    let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

    let mut feature_importances: Vec<(String, f64)> = HIGH_VALUE_FEATURES
        .iter()
        .map(|s| s.to_string())
        .zip(forest.feature_importances())
        .collect();
    feature_importances.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(HighValueModel {
        train_rows: train.len(),
        test_rows: test.len(),
        positive_rate: positives as f64 / labels.len() as f64,
        accuracy: ratio(correct, test.len()),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
        feature_importances,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerReport {
    pub total_customers: usize,
    pub total_revenue: f64,
    pub frequency_basis: FrequencyBasis,
    pub repeat_customers: usize,
    pub active_customers: usize,
    pub churned_customers: usize,
    pub avg_clv: f64,
    pub segments: Vec<SegmentSummary>,
    pub clv_by_category: Vec<ClvGroup>,
    pub clv_by_segment: Vec<ClvGroup>,
    pub delivery_impact: DeliveryImpact,
    /// The classifier may lack data while the rest of the report is valid
    pub high_value_model: Result<HighValueModel, String>,
}

pub fn analyze_customers(table: &CustomerTable, n_trees: usize, seed: u64) -> DataResult<CustomerReport> {
    let customers = &table.customers;
    if customers.is_empty() {
        return Err(DataError::empty_result("customer analytics"));
    }
    let clvs: Vec<f64> = customers.iter().map(|c| c.clv).collect();

    Ok(CustomerReport {
        total_customers: customers.len(),
        total_revenue: table.total_revenue(),
        frequency_basis: table.frequency_basis,
        repeat_customers: customers.iter().filter(|c| c.is_repeat).count(),
        active_customers: customers
            .iter()
            .filter(|c| c.status == CustomerStatus::Active)
            .count(),
        churned_customers: customers
            .iter()
            .filter(|c| c.status == CustomerStatus::Churned)
            .count(),
        avg_clv: mean(&clvs).unwrap_or(0.0),
        segments: segment_summary(customers),
        clv_by_category: clv_by_category(customers),
        clv_by_segment: clv_by_segment(customers),
        delivery_impact: delivery_impact(customers),
        high_value_model: train_high_value_model(customers, n_trees, seed).map_err(|e| e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_split_keeps_class_ratio() {
        let labels: Vec<bool> = (0..100).map(|i| i % 4 == 0).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let (train, test) = stratified_split(&labels, 0.2, &mut rng);
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.iter().filter(|&&i| labels[i]).count(), 5);
        assert_eq!(test.len(), 20);
    }
}
