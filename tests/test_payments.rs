//! Tests for payment preferences and delivery operations

use ecomlens::pipeline::features::DeliveryAccuracy;
use ecomlens::pipeline::payments::{
    analyze_payments, join_payments, method_distribution, satisfaction_by_installments,
};
use ecomlens::pipeline::DataError;

#[path = "common/mod.rs"]
mod common;

use common::{customer, item, order, payment, review};

fn fixture() -> (
    Vec<ecomlens::pipeline::records::Payment>,
    Vec<ecomlens::pipeline::features::OrderFeatures>,
    Vec<ecomlens::pipeline::records::Customer>,
) {
    let orders = vec![
        order("o1", "c1", "2018-01-01 10:00:00", Some("2018-01-05 10:00:00"), "2018-01-10 00:00:00"),
        order("o2", "c2", "2018-01-02 10:00:00", Some("2018-01-25 10:00:00"), "2018-01-12 00:00:00"),
        order("o3", "c3", "2018-01-03 10:00:00", Some("2018-01-09 10:00:00"), "2018-01-20 00:00:00"),
        order("o4", "c1", "2018-01-04 10:00:00", None, "2018-01-20 00:00:00"),
    ];
    let items = vec![
        item("o1", 100.0, 10.0),
        item("o2", 200.0, 20.0),
        item("o3", 50.0, 5.0),
        item("o4", 80.0, 8.0),
    ];
    let reviews = vec![review("o1", 5), review("o2", 1), review("o3", 4)];
    let order_features = ecomlens::pipeline::features::build_order_features(&orders, &items, &reviews);

    let payments = vec![
        payment("o1", "credit_card", 2, 110.0),
        payment("o2", "credit_card", 8, 220.0),
        payment("o3", "boleto", 1, 55.0),
        payment("o4", "voucher", 1, 40.0),
        payment("o4", "credit_card", 1, 48.0),
        payment("ghost", "boleto", 1, 10.0),
    ];
    let customers = vec![customer("c1", "SP"), customer("c2", "RJ"), customer("c3", "SP")];
    (payments, order_features, customers)
}

#[test]
fn test_method_shares_sum_to_hundred() {
    let (payments, orders, customers) = fixture();
    let rows = join_payments(&payments, &orders, &customers);
    let shares = method_distribution(&rows);

    let total: f64 = shares.iter().map(|s| s.share_pct).sum();
    assert!((total - 100.0).abs() < 1e-9, "Shares sum to {}", total);
    assert_eq!(shares[0].payment_type, "credit_card");
    assert_eq!(shares[0].payments, 3);
    assert!((shares[0].total_value - 378.0).abs() < 1e-9);
}

#[test]
fn test_report_counts_payment_rows() {
    let (payments, orders, customers) = fixture();
    let report = analyze_payments(&payments, &orders, &customers).unwrap();

    assert_eq!(report.total_payments, 6);
    assert_eq!(report.unmatched_payments, 1);
    assert!((report.total_value - 483.0).abs() < 1e-9);

    let card = report
        .installments
        .iter()
        .find(|s| s.payment_type == "credit_card")
        .unwrap();
    assert_eq!(card.payments, 3);
    assert!((card.avg_installments - 11.0 / 3.0).abs() < 1e-9);
    assert_eq!(card.median_installments, 2.0);
}

#[test]
fn test_zero_installments_fall_outside_the_buckets() {
    let (mut payments, orders, customers) = fixture();
    // o1 is reviewed; with zero installments it joins no bucket
    payments[0].installments = 0;
    let rows = join_payments(&payments, &orders, &customers);
    let buckets = satisfaction_by_installments(&rows);

    let labels: Vec<&str> = buckets.iter().map(|b| b.group.as_str()).collect();
    assert_eq!(labels, vec!["Single Payment", "7-12 Installments"]);
    let reviews: usize = buckets.iter().map(|b| b.reviews).sum();
    assert_eq!(reviews, 2, "Only o2 and o3 are bucketed");
    assert_eq!(buckets[0].avg_review, 4.0);
}

#[test]
fn test_operations_count_distinct_orders() {
    let (payments, orders, customers) = fixture();
    let report = analyze_payments(&payments, &orders, &customers).unwrap();
    let ops = &report.operations;

    // o4 has two payments but is one order
    assert_eq!(ops.total_orders, 4);
    assert_eq!(ops.delivered_orders, 4);
    assert_eq!(ops.avg_delivery_days, Some((4.0 + 23.0 + 6.0) / 3.0));
    assert_eq!(ops.median_delivery_days, Some(6.0));
    let on_time = ops.on_time_rate_pct.unwrap();
    assert!((on_time - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_satisfaction_by_method_uses_reviewed_payments() {
    let (payments, orders, customers) = fixture();
    let report = analyze_payments(&payments, &orders, &customers).unwrap();

    let card = report
        .satisfaction_by_method
        .iter()
        .find(|s| s.group == "credit_card")
        .unwrap();
    assert_eq!(card.reviews, 2);
    assert_eq!(card.avg_review, 3.0);
    assert!(
        report.satisfaction_by_method.iter().all(|s| s.group != "voucher"),
        "Voucher order has no review"
    );
}

#[test]
fn test_late_orders_review_worse() {
    let (payments, orders, customers) = fixture();
    let report = analyze_payments(&payments, &orders, &customers).unwrap();

    let late = report
        .delay_impact
        .iter()
        .find(|d| d.accuracy == DeliveryAccuracy::Late)
        .unwrap();
    assert_eq!(late.orders, 1);
    assert_eq!(late.avg_review, Some(1.0));

    let states: Vec<&str> = report.state_performance.iter().map(|s| s.state.as_str()).collect();
    assert_eq!(states, vec!["SP", "RJ"], "SP is always on time");
}

#[test]
fn test_regional_preferences_share_within_state() {
    let (payments, orders, customers) = fixture();
    let report = analyze_payments(&payments, &orders, &customers).unwrap();

    let sp_card = report
        .regional_preferences
        .iter()
        .find(|r| r.state == "SP" && r.payment_type == "credit_card")
        .unwrap();
    assert_eq!(sp_card.payments, 2);
    assert!((sp_card.share_pct - 50.0).abs() < 1e-9);

    // Unmatched payments have no state
    let rows: usize = report.regional_preferences.iter().map(|r| r.payments).sum();
    assert_eq!(rows, 5);

    // Far below the minimum reviewed sample per state and method
    assert!(report.regional_satisfaction.is_empty());
}

#[test]
fn test_generated_payments_cover_orders() {
    let dir = common::generated_dataset_dir(300, 11);
    let catalog = ecomlens::pipeline::DataCatalog::load(dir.path(), 1000);
    let data = ecomlens::pipeline::clean_catalog(&catalog, Default::default());
    let order_features = ecomlens::pipeline::order_features(&data).unwrap();
    let report = analyze_payments(data.payments().unwrap(), &order_features, data.customers().unwrap()).unwrap();

    assert_eq!(report.unmatched_payments, 0);
    let total: f64 = report.methods.iter().map(|s| s.share_pct).sum();
    assert!((total - 100.0).abs() < 1e-6);
}

#[test]
fn test_empty_payments_is_an_error() {
    let (_, orders, customers) = fixture();
    let err = analyze_payments(&[], &orders, &customers).unwrap_err();
    assert!(matches!(err, DataError::EmptyResult { .. }));
}
