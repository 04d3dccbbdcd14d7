//! Payment operations: method mix, installments, satisfaction and delivery
//! performance
//!
//! Payment-level statistics run over one row per payment record joined with
//! its order's features and customer state. Operational and state metrics run
//! over distinct orders.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use super::correlation::{correlation_matrix, CorrelationMatrix};
use super::error::{DataError, DataResult};
use super::features::{DeliveryAccuracy, OrderFeatures};
use super::records::{Customer, Payment};
use super::stats::{mean, median, sample_std};

/// State × method combinations with fewer reviewed payments are not reported
pub const MIN_REGIONAL_SAMPLE: usize = 50;

/// A payment joined with its order and customer
#[derive(Debug, Clone)]
pub struct PaymentRow<'a> {
    pub payment: &'a Payment,
    pub order: Option<&'a OrderFeatures>,
    pub state: Option<&'a str>,
}

impl PaymentRow<'_> {
    fn review_score(&self) -> Option<f64> {
        self.order.and_then(|o| o.review_score)
    }

    fn delivery_days(&self) -> Option<f64> {
        self.order.and_then(|o| o.delivery_days).map(|d| d as f64)
    }

    fn on_time(&self) -> Option<bool> {
        self.order.and_then(|o| o.on_time)
    }
}

pub fn join_payments<'a>(
    payments: &'a [Payment],
    orders: &'a [OrderFeatures],
    customers: &'a [Customer],
) -> Vec<PaymentRow<'a>> {
    let order_by_id: HashMap<&str, &OrderFeatures> =
        orders.iter().map(|o| (o.order_id.as_str(), o)).collect();
    let state_by_customer: HashMap<&str, &str> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c.state.as_str()))
        .collect();

    payments
        .iter()
        .map(|payment| {
            let order = order_by_id.get(payment.order_id.as_str()).copied();
            let state = order.and_then(|o| state_by_customer.get(o.customer_id.as_str()).copied());
            PaymentRow {
                payment,
                order,
                state,
            }
        })
        .collect()
}

fn group_by<'r, 'a, K: Ord>(
    rows: impl IntoIterator<Item = &'r PaymentRow<'a>>,
    key: impl Fn(&PaymentRow<'a>) -> Option<K>,
) -> BTreeMap<K, Vec<&'r PaymentRow<'a>>>
where
    'a: 'r,
{
    let mut groups: BTreeMap<K, Vec<&PaymentRow>> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row);
        }
    }
    groups
}

fn values<'r, 'a: 'r>(rows: &[&'r PaymentRow<'a>], f: impl Fn(&PaymentRow<'a>) -> Option<f64>) -> Vec<f64> {
    rows.iter().filter_map(|r| f(*r)).collect()
}

/// Percentage of known flags that are true
fn rate_pct(flags: impl Iterator<Item = Option<bool>>) -> Option<f64> {
    let known: Vec<f64> = flags.flatten().map(|b| if b { 100.0 } else { 0.0 }).collect();
    mean(&known)
}

fn by_desc<T>(key: impl Fn(&T) -> f64, tie: impl Fn(&T, &T) -> Ordering) -> impl Fn(&T, &T) -> Ordering {
    move |a: &T, b: &T| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie(a, b))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodShare {
    pub payment_type: String,
    pub payments: usize,
    pub share_pct: f64,
    pub total_value: f64,
}

/// Share of payment rows per method, most used first
pub fn method_distribution(rows: &[PaymentRow]) -> Vec<MethodShare> {
    let total = rows.len() as f64;
    let mut shares: Vec<MethodShare> = group_by(rows, |r| Some(r.payment.payment_type.as_str()))
        .into_iter()
        .map(|(method, members)| MethodShare {
            payment_type: method.to_string(),
            payments: members.len(),
            share_pct: members.len() as f64 / total * 100.0,
            total_value: members.iter().filter_map(|r| r.payment.value).sum(),
        })
        .collect();
    shares.sort_by(by_desc(|s: &MethodShare| s.payments as f64, |a, b| {
        a.payment_type.cmp(&b.payment_type)
    }));
    shares
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentStats {
    pub payment_type: String,
    pub payments: usize,
    pub avg_installments: f64,
    pub median_installments: f64,
    pub std_installments: Option<f64>,
    pub avg_value: Option<f64>,
    pub median_value: Option<f64>,
}

pub fn installment_stats(rows: &[PaymentRow]) -> Vec<InstallmentStats> {
    group_by(rows, |r| Some(r.payment.payment_type.as_str()))
        .into_iter()
        .map(|(method, members)| {
            let installments = values(&members, |r| Some(f64::from(r.payment.installments)));
            let value = values(&members, |r| r.payment.value);
            InstallmentStats {
                payment_type: method.to_string(),
                payments: members.len(),
                avg_installments: mean(&installments).unwrap_or(0.0),
                median_installments: median(&installments).unwrap_or(0.0),
                std_installments: sample_std(&installments),
                avg_value: mean(&value),
                median_value: median(&value),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalPreference {
    pub state: String,
    pub payment_type: String,
    pub payments: usize,
    /// Share of the state's payments
    pub share_pct: f64,
    pub avg_value: Option<f64>,
    pub avg_installments: f64,
}

pub fn regional_preferences(rows: &[PaymentRow]) -> Vec<RegionalPreference> {
    let mut out = Vec::new();
    for (state, members) in group_by(rows, |r| r.state) {
        let state_total = members.len() as f64;
        for (method, group) in group_by(members.iter().copied(), |r| {
            Some(r.payment.payment_type.as_str())
        }) {
            out.push(RegionalPreference {
                state: state.to_string(),
                payment_type: method.to_string(),
                payments: group.len(),
                share_pct: group.len() as f64 / state_total * 100.0,
                avg_value: mean(&values(&group, |r| r.payment.value)),
                avg_installments: mean(&values(&group, |r| Some(f64::from(r.payment.installments))))
                    .unwrap_or(0.0),
            });
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum InstallmentBucket {
    #[serde(rename = "Single Payment")]
    Single,
    #[serde(rename = "2-3 Installments")]
    TwoToThree,
    #[serde(rename = "4-6 Installments")]
    FourToSix,
    #[serde(rename = "7-12 Installments")]
    SevenToTwelve,
    #[serde(rename = "12+ Installments")]
    OverTwelve,
}

impl InstallmentBucket {
    /// `None` for zero installments, which belong to no bucket
    pub fn from_installments(n: u32) -> Option<Self> {
        match n {
            0 => None,
            1 => Some(InstallmentBucket::Single),
            2..=3 => Some(InstallmentBucket::TwoToThree),
            4..=6 => Some(InstallmentBucket::FourToSix),
            7..=12 => Some(InstallmentBucket::SevenToTwelve),
            _ => Some(InstallmentBucket::OverTwelve),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstallmentBucket::Single => "Single Payment",
            InstallmentBucket::TwoToThree => "2-3 Installments",
            InstallmentBucket::FourToSix => "4-6 Installments",
            InstallmentBucket::SevenToTwelve => "7-12 Installments",
            InstallmentBucket::OverTwelve => "12+ Installments",
        }
    }
}

impl fmt::Display for InstallmentBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review statistics of one group of reviewed payments
#[derive(Debug, Clone, Serialize)]
pub struct SatisfactionStats {
    pub group: String,
    pub reviews: usize,
    pub avg_review: f64,
    pub std_review: Option<f64>,
    pub avg_value: Option<f64>,
    pub avg_installments: f64,
    pub avg_delivery_days: Option<f64>,
    pub on_time_rate_pct: Option<f64>,
}

fn satisfaction(group: String, members: &[&PaymentRow]) -> SatisfactionStats {
    let reviews = values(members, |r| r.review_score());
    SatisfactionStats {
        group,
        reviews: reviews.len(),
        avg_review: mean(&reviews).unwrap_or(0.0),
        std_review: sample_std(&reviews),
        avg_value: mean(&values(members, |r| r.payment.value)),
        avg_installments: mean(&values(members, |r| Some(f64::from(r.payment.installments))))
            .unwrap_or(0.0),
        avg_delivery_days: mean(&values(members, |r| r.delivery_days())),
        on_time_rate_pct: rate_pct(members.iter().map(|r| r.on_time())),
    }
}

fn reviewed<'r, 'a>(rows: &'r [PaymentRow<'a>]) -> impl Iterator<Item = &'r PaymentRow<'a>> {
    rows.iter().filter(|r| r.review_score().is_some())
}

pub fn satisfaction_by_installments(rows: &[PaymentRow]) -> Vec<SatisfactionStats> {
    group_by(reviewed(rows), |r| InstallmentBucket::from_installments(r.payment.installments))
    .into_iter()
    .map(|(bucket, members)| satisfaction(bucket.label().to_string(), &members))
    .collect()
}

pub fn satisfaction_by_method(rows: &[PaymentRow]) -> Vec<SatisfactionStats> {
    group_by(reviewed(rows), |r| Some(r.payment.payment_type.as_str()))
        .into_iter()
        .map(|(method, members)| satisfaction(method.to_string(), &members))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalSatisfaction {
    pub state: String,
    pub payment_type: String,
    pub stats: SatisfactionStats,
}

/// State × method satisfaction, keeping combinations with at least
/// [`MIN_REGIONAL_SAMPLE`] reviewed payments
pub fn regional_satisfaction(rows: &[PaymentRow]) -> Vec<RegionalSatisfaction> {
    group_by(reviewed(rows), |r| {
        r.state.map(|s| (s, r.payment.payment_type.as_str()))
    })
    .into_iter()
    .filter(|(_, members)| members.len() >= MIN_REGIONAL_SAMPLE)
    .map(|((state, method), members)| RegionalSatisfaction {
        state: state.to_string(),
        payment_type: method.to_string(),
        stats: satisfaction(format!("{} / {}", state, method), &members),
    })
    .collect()
}

pub const CORRELATION_COLUMNS: [&str; 4] = [
    "payment_installments",
    "payment_value",
    "review_score",
    "delivery_days",
];

/// Correlations over rows where all four variables are present
pub fn payment_correlations(rows: &[PaymentRow]) -> Option<CorrelationMatrix> {
    let mut columns: Vec<(String, Vec<f64>)> = CORRELATION_COLUMNS
        .iter()
        .map(|n| (n.to_string(), Vec::new()))
        .collect();
    for row in rows {
        let (Some(value), Some(review), Some(days)) =
            (row.payment.value, row.review_score(), row.delivery_days())
        else {
            continue;
        };
        for (column, v) in columns
            .iter_mut()
            .zip([f64::from(row.payment.installments), value, review, days])
        {
            column.1.push(v);
        }
    }
    correlation_matrix(&columns)
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationalMetrics {
    pub total_orders: usize,
    pub delivered_orders: usize,
    pub delivery_rate_pct: f64,
    pub avg_delivery_days: Option<f64>,
    pub median_delivery_days: Option<f64>,
    pub on_time_rate_pct: Option<f64>,
    pub avg_processing_days: Option<f64>,
    pub avg_shipping_days: Option<f64>,
}

fn day_values(orders: &[&OrderFeatures], f: impl Fn(&OrderFeatures) -> Option<i64>) -> Vec<f64> {
    orders.iter().filter_map(|o| f(*o)).map(|d| d as f64).collect()
}

pub fn operational_metrics(orders: &[OrderFeatures]) -> OperationalMetrics {
    let all: Vec<&OrderFeatures> = orders.iter().collect();
    let delivered = orders.iter().filter(|o| o.status == "delivered").count();
    let delivery_days = day_values(&all, |o| o.delivery_days);
    OperationalMetrics {
        total_orders: orders.len(),
        delivered_orders: delivered,
        delivery_rate_pct: if orders.is_empty() {
            0.0
        } else {
            delivered as f64 / orders.len() as f64 * 100.0
        },
        avg_delivery_days: mean(&delivery_days),
        median_delivery_days: median(&delivery_days),
        on_time_rate_pct: rate_pct(orders.iter().map(|o| o.on_time)),
        avg_processing_days: mean(&day_values(&all, |o| o.processing_days)),
        avg_shipping_days: mean(&day_values(&all, |o| o.shipping_days)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatePerformance {
    pub state: String,
    pub orders: usize,
    pub avg_delivery_days: Option<f64>,
    pub median_delivery_days: Option<f64>,
    pub on_time_rate_pct: Option<f64>,
    pub avg_review: Option<f64>,
    pub avg_order_value: f64,
}

/// Delivery performance per customer state, best on-time rate first with
/// ties broken by state code
pub fn state_performance(orders: &[OrderFeatures], customers: &[Customer]) -> Vec<StatePerformance> {
    let state_by_customer: HashMap<&str, &str> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c.state.as_str()))
        .collect();
    let mut groups: BTreeMap<&str, Vec<&OrderFeatures>> = BTreeMap::new();
    for order in orders {
        if let Some(state) = state_by_customer.get(order.customer_id.as_str()) {
            groups.entry(*state).or_default().push(order);
        }
    }

    let mut rows: Vec<StatePerformance> = groups
        .into_iter()
        .map(|(state, members)| {
            let delivery_days = day_values(&members, |o| o.delivery_days);
            let reviews: Vec<f64> = members.iter().filter_map(|o| o.review_score).collect();
            let order_values: Vec<f64> = members.iter().map(|o| o.order_value).collect();
            StatePerformance {
                state: state.to_string(),
                orders: members.len(),
                avg_delivery_days: mean(&delivery_days),
                median_delivery_days: median(&delivery_days),
                on_time_rate_pct: rate_pct(members.iter().map(|o| o.on_time)),
                avg_review: mean(&reviews),
                avg_order_value: mean(&order_values).unwrap_or(0.0),
            }
        })
        .collect();
    rows.sort_by(by_desc(
        |s: &StatePerformance| s.on_time_rate_pct.unwrap_or(-1.0),
        |a, b| a.state.cmp(&b.state),
    ));
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayImpact {
    pub accuracy: DeliveryAccuracy,
    pub orders: usize,
    pub avg_review: Option<f64>,
}

/// Review score by delivery accuracy class
pub fn delay_impact(orders: &[OrderFeatures]) -> Vec<DelayImpact> {
    let mut groups: BTreeMap<DeliveryAccuracy, Vec<f64>> = BTreeMap::new();
    let mut counts: BTreeMap<DeliveryAccuracy, usize> = BTreeMap::new();
    for order in orders {
        let Some(accuracy) = order.delivery_accuracy else {
            continue;
        };
        *counts.entry(accuracy).or_default() += 1;
        let reviews = groups.entry(accuracy).or_default();
        if let Some(score) = order.review_score {
            reviews.push(score);
        }
    }
    counts
        .into_iter()
        .map(|(accuracy, orders)| DelayImpact {
            accuracy,
            orders,
            avg_review: groups.get(&accuracy).and_then(|r| mean(r)),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReport {
    pub total_payments: usize,
    pub total_value: f64,
    /// Payments whose order is missing from the orders table
    pub unmatched_payments: usize,
    pub methods: Vec<MethodShare>,
    pub installments: Vec<InstallmentStats>,
    pub regional_preferences: Vec<RegionalPreference>,
    pub satisfaction_by_installments: Vec<SatisfactionStats>,
    pub satisfaction_by_method: Vec<SatisfactionStats>,
    pub regional_satisfaction: Vec<RegionalSatisfaction>,
    pub correlations: Option<CorrelationMatrix>,
    pub operations: OperationalMetrics,
    pub state_performance: Vec<StatePerformance>,
    pub delay_impact: Vec<DelayImpact>,
}

pub fn analyze_payments(
    payments: &[Payment],
    orders: &[OrderFeatures],
    customers: &[Customer],
) -> DataResult<PaymentReport> {
    if payments.is_empty() {
        return Err(DataError::empty_result("payment operations"));
    }
    let rows = join_payments(payments, orders, customers);
    let unmatched = rows.iter().filter(|r| r.order.is_none()).count();
    if unmatched > 0 {
        tracing::warn!(payments = unmatched, "payments reference unknown orders");
    }

    Ok(PaymentReport {
        total_payments: rows.len(),
        total_value: payments.iter().filter_map(|p| p.value).sum(),
        unmatched_payments: unmatched,
        methods: method_distribution(&rows),
        installments: installment_stats(&rows),
        regional_preferences: regional_preferences(&rows),
        satisfaction_by_installments: satisfaction_by_installments(&rows),
        satisfaction_by_method: satisfaction_by_method(&rows),
        regional_satisfaction: regional_satisfaction(&rows),
        correlations: payment_correlations(&rows),
        operations: operational_metrics(orders),
        state_performance: state_performance(orders, customers),
        delay_impact: delay_impact(orders),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installment_buckets() {
        assert_eq!(InstallmentBucket::from_installments(0), None);
        assert_eq!(InstallmentBucket::from_installments(1), Some(InstallmentBucket::Single));
        assert_eq!(InstallmentBucket::from_installments(3), Some(InstallmentBucket::TwoToThree));
        assert_eq!(InstallmentBucket::from_installments(6), Some(InstallmentBucket::FourToSix));
        assert_eq!(InstallmentBucket::from_installments(12), Some(InstallmentBucket::SevenToTwelve));
        assert_eq!(InstallmentBucket::from_installments(24), Some(InstallmentBucket::OverTwelve));
    }

    #[test]
    fn test_rate_pct_ignores_unknown() {
        let rate = rate_pct([Some(true), None, Some(false), Some(true)].into_iter()).unwrap();
        assert!((rate - 200.0 / 3.0).abs() < 1e-9);
        assert!(rate_pct([None, None].into_iter()).is_none());
    }
}
