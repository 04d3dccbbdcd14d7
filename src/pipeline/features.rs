//! Per-order and per-customer derived features
//!
//! Order features join items and reviews onto each order; customer metrics
//! aggregate those per customer and attach RFM scores, CLV and activity
//! status. Both are computed once per run and never mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

use super::error::{DataError, DataResult};
use super::quantile::rank_scores;
use super::records::{Customer, Order, OrderItem, Review};
use super::rfm::{score_rfm, segment_for, FrequencyAxis, FrequencyBasis, RfmInput, RfmScore, Segment};

/// Average month length used to convert day spans into months
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Whole days from `start` to `end`, floored
pub fn days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DeliverySpeed {
    #[serde(rename = "Very Fast")]
    VeryFast,
    Fast,
    Normal,
    Slow,
    #[serde(rename = "Very Slow")]
    VerySlow,
}

impl DeliverySpeed {
    pub const ALL: [DeliverySpeed; 5] = [
        DeliverySpeed::VeryFast,
        DeliverySpeed::Fast,
        DeliverySpeed::Normal,
        DeliverySpeed::Slow,
        DeliverySpeed::VerySlow,
    ];

    /// Bins of 0-7, 8-14, 15-21, 22-30 and over 30 days
    pub fn from_days(days: f64) -> Self {
        if days <= 7.0 {
            DeliverySpeed::VeryFast
        } else if days <= 14.0 {
            DeliverySpeed::Fast
        } else if days <= 21.0 {
            DeliverySpeed::Normal
        } else if days <= 30.0 {
            DeliverySpeed::Slow
        } else {
            DeliverySpeed::VerySlow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliverySpeed::VeryFast => "Very Fast",
            DeliverySpeed::Fast => "Fast",
            DeliverySpeed::Normal => "Normal",
            DeliverySpeed::Slow => "Slow",
            DeliverySpeed::VerySlow => "Very Slow",
        }
    }
}

impl fmt::Display for DeliverySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivery date relative to the promised date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DeliveryAccuracy {
    #[serde(rename = "Much Earlier")]
    MuchEarlier,
    Earlier,
    #[serde(rename = "On Time")]
    OnTime,
    Late,
    #[serde(rename = "Very Late")]
    VeryLate,
}

impl DeliveryAccuracy {
    /// `delta_days` is delivered minus estimated; edges at -7, 0, 7 and 14
    pub fn from_delta(delta_days: i64) -> Self {
        if delta_days <= -7 {
            DeliveryAccuracy::MuchEarlier
        } else if delta_days <= 0 {
            DeliveryAccuracy::Earlier
        } else if delta_days <= 7 {
            DeliveryAccuracy::OnTime
        } else if delta_days <= 14 {
            DeliveryAccuracy::Late
        } else {
            DeliveryAccuracy::VeryLate
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryAccuracy::MuchEarlier => "Much Earlier",
            DeliveryAccuracy::Earlier => "Earlier",
            DeliveryAccuracy::OnTime => "On Time",
            DeliveryAccuracy::Late => "Late",
            DeliveryAccuracy::VeryLate => "Very Late",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderCalendar {
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    /// 0 = Monday
    pub weekday: u32,
    pub hour: u32,
    pub iso_week: u32,
    pub is_weekend: bool,
    /// November and December
    pub is_holiday_season: bool,
    pub is_carnival_season: bool,
    pub is_mothers_day_season: bool,
    pub is_valentines_season: bool,
}

impl OrderCalendar {
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        let month = ts.month();
        let weekday = ts.weekday().num_days_from_monday();
        OrderCalendar {
            year: ts.year(),
            month,
            quarter: (month - 1) / 3 + 1,
            weekday,
            hour: ts.hour(),
            iso_week: ts.iso_week().week(),
            is_weekend: weekday >= 5,
            is_holiday_season: month == 11 || month == 12,
            is_carnival_season: month == 2 || month == 3,
            is_mothers_day_season: month == 5,
            is_valentines_season: month == 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderFeatures {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub purchased_at: NaiveDateTime,
    /// Sum of price plus freight over the order's items; 0 without items
    pub order_value: f64,
    pub items_value: f64,
    pub freight_value: f64,
    pub item_count: usize,
    /// Present only when both purchase and delivery timestamps exist
    pub delivery_days: Option<i64>,
    pub delivery_vs_estimate_days: Option<i64>,
    pub on_time: Option<bool>,
    pub processing_days: Option<i64>,
    pub shipping_days: Option<i64>,
    pub delivery_speed: Option<DeliverySpeed>,
    pub delivery_accuracy: Option<DeliveryAccuracy>,
    pub calendar: OrderCalendar,
    /// Mean review score of the order
    pub review_score: Option<f64>,
}

/// Join items and reviews onto orders. Orders without a purchase timestamp are skipped.
pub fn build_order_features(
    orders: &[Order],
    items: &[OrderItem],
    reviews: &[Review],
) -> Vec<OrderFeatures> {
    let mut totals: HashMap<&str, (f64, f64, usize)> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.order_id.as_str()).or_insert((0.0, 0.0, 0));
        entry.0 += item.price;
        entry.1 += item.freight_value;
        entry.2 += 1;
    }

    let mut scores: HashMap<&str, (f64, usize)> = HashMap::new();
    for review in reviews {
        if let Some(score) = review.score {
            let entry = scores.entry(review.order_id.as_str()).or_insert((0.0, 0));
            entry.0 += f64::from(score);
            entry.1 += 1;
        }
    }

    orders
        .iter()
        .filter_map(|order| {
            let purchased_at = order.purchased_at?;
            let (items_value, freight_value, item_count) = totals
                .get(order.order_id.as_str())
                .copied()
                .unwrap_or((0.0, 0.0, 0));

            let delivered = order.delivered_customer_at.filter(|d| *d >= purchased_at);
            let delivery_days = delivered.map(|d| days_between(purchased_at, d));
            let delivery_vs_estimate_days = delivered
                .zip(order.estimated_delivery_at)
                .map(|(d, e)| days_between(e, d));

            Some(OrderFeatures {
                order_id: order.order_id.clone(),
                customer_id: order.customer_id.clone(),
                status: order.status.clone(),
                purchased_at,
                order_value: items_value + freight_value,
                items_value,
                freight_value,
                item_count,
                delivery_days,
                delivery_vs_estimate_days,
                on_time: delivery_vs_estimate_days.map(|d| d <= 0),
                processing_days: order
                    .delivered_carrier_at
                    .map(|c| days_between(purchased_at, c)),
                shipping_days: order
                    .delivered_carrier_at
                    .zip(delivered)
                    .map(|(c, d)| days_between(c, d)),
                delivery_speed: delivery_days.map(|d| DeliverySpeed::from_days(d as f64)),
                delivery_accuracy: delivery_vs_estimate_days.map(DeliveryAccuracy::from_delta),
                calendar: OrderCalendar::from_timestamp(purchased_at),
                review_score: scores
                    .get(order.order_id.as_str())
                    .map(|(sum, n)| sum / *n as f64),
            })
        })
        .collect()
}

/// Reference date for recency: the latest purchase in the data
pub fn analysis_date(orders: &[OrderFeatures]) -> Option<NaiveDateTime> {
    orders.iter().map(|o| o.purchased_at).max()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ClvCategory {
    #[serde(rename = "Low Value")]
    LowValue,
    #[serde(rename = "Medium Value")]
    MediumValue,
    #[serde(rename = "High Value")]
    HighValue,
    #[serde(rename = "VIP")]
    Vip,
}

impl ClvCategory {
    pub const ALL: [ClvCategory; 4] = [
        ClvCategory::LowValue,
        ClvCategory::MediumValue,
        ClvCategory::HighValue,
        ClvCategory::Vip,
    ];

    fn from_quartile(q: u8) -> Self {
        match q {
            0 | 1 => ClvCategory::LowValue,
            2 => ClvCategory::MediumValue,
            3 => ClvCategory::HighValue,
            _ => ClvCategory::Vip,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClvCategory::LowValue => "Low Value",
            ClvCategory::MediumValue => "Medium Value",
            ClvCategory::HighValue => "High Value",
            ClvCategory::Vip => "VIP",
        }
    }

    pub fn is_high_value(&self) -> bool {
        matches!(self, ClvCategory::HighValue | ClvCategory::Vip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CustomerStatus {
    Active,
    Inactive,
    Churned,
}

impl CustomerStatus {
    /// Active up to 90 days since the last order, inactive up to 180
    pub fn from_recency(days: i64) -> Self {
        if days <= 90 {
            CustomerStatus::Active
        } else if days <= 180 {
            CustomerStatus::Inactive
        } else {
            CustomerStatus::Churned
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerMetrics {
    pub customer_id: String,
    pub unique_id: Option<String>,
    pub state: Option<String>,
    pub total_orders: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub first_order: NaiveDateTime,
    pub last_order: NaiveDateTime,
    pub recency_days: i64,
    pub lifetime_days: i64,
    pub orders_per_month: f64,
    pub clv: f64,
    pub clv_category: ClvCategory,
    pub status: CustomerStatus,
    pub is_repeat: bool,
    pub avg_delivery_days: Option<f64>,
    /// Share of this customer's delivered orders that arrived on time
    pub delivery_reliability: Option<f64>,
    pub avg_review_score: Option<f64>,
    pub rfm: RfmScore,
    pub segment: Segment,
}

/// Customer metrics of one run together with the scoring context
#[derive(Debug, Clone, Serialize)]
pub struct CustomerTable {
    pub customers: Vec<CustomerMetrics>,
    pub analysis_date: NaiveDateTime,
    pub frequency_basis: FrequencyBasis,
}

impl CustomerTable {
    pub fn total_revenue(&self) -> f64 {
        self.customers.iter().map(|c| c.total_revenue).sum()
    }
}

#[derive(Default)]
struct CustomerAccumulator {
    orders: usize,
    revenue: f64,
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
    delivery_days: Vec<f64>,
    on_time: Vec<bool>,
    review_scores: Vec<f64>,
}

fn mean_of(values: &[f64]) -> Option<f64> {
    super::stats::mean(values)
}

/// Aggregate order features per customer and score them.
///
/// Customers are keyed by `customer_id`; state and unique id come from the
/// customer table when the id is present there.
pub fn build_customer_metrics(
    orders: &[OrderFeatures],
    customers: &[Customer],
    axis: FrequencyAxis,
) -> DataResult<CustomerTable> {
    let analysis_date =
        analysis_date(orders).ok_or_else(|| DataError::empty_result("customer metrics"))?;

    // BTreeMap keeps customer order deterministic
    let mut acc: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    for order in orders {
        let entry = acc.entry(order.customer_id.as_str()).or_default();
        entry.orders += 1;
        entry.revenue += order.order_value;
        entry.first = Some(entry.first.map_or(order.purchased_at, |f| f.min(order.purchased_at)));
        entry.last = Some(entry.last.map_or(order.purchased_at, |l| l.max(order.purchased_at)));
        if let Some(days) = order.delivery_days {
            entry.delivery_days.push(days as f64);
        }
        if let Some(on_time) = order.on_time {
            entry.on_time.push(on_time);
        }
        if let Some(score) = order.review_score {
            entry.review_scores.push(score);
        }
    }

    let profiles: HashMap<&str, &Customer> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c))
        .collect();

    struct Base<'a> {
        id: &'a str,
        acc: CustomerAccumulator,
        first: NaiveDateTime,
        last: NaiveDateTime,
    }
    let bases: Vec<Base> = acc
        .into_iter()
        .filter_map(|(id, acc)| {
            let first = acc.first?;
            let last = acc.last?;
            Some(Base { id, acc, first, last })
        })
        .collect();

    let rfm_inputs: Vec<RfmInput> = bases
        .iter()
        .map(|b| RfmInput {
            recency_days: days_between(b.last, analysis_date),
            orders: b.acc.orders,
            revenue: b.acc.revenue,
            avg_delivery_days: mean_of(&b.acc.delivery_days),
        })
        .collect();
    let (scores, frequency_basis) = score_rfm(&rfm_inputs, axis);

    let clvs: Vec<f64> = bases
        .iter()
        .map(|b| {
            let lifetime = days_between(b.first, b.last);
            let per_month = orders_per_month(b.acc.orders, lifetime);
            let aov = b.acc.revenue / b.acc.orders as f64;
            aov * per_month * (lifetime as f64 / DAYS_PER_MONTH).max(1.0)
        })
        .collect();
    let clv_quartiles = rank_scores(&clvs, 4);

    let customers = bases
        .into_iter()
        .zip(rfm_inputs)
        .zip(scores)
        .zip(clvs.into_iter().zip(clv_quartiles))
        .map(|(((base, input), rfm), (clv, quartile))| {
            let profile = profiles.get(base.id);
            let lifetime_days = days_between(base.first, base.last);
            let reliability = if base.acc.on_time.is_empty() {
                None
            } else {
                Some(
                    base.acc.on_time.iter().filter(|t| **t).count() as f64
                        / base.acc.on_time.len() as f64,
                )
            };
            CustomerMetrics {
                customer_id: base.id.to_string(),
                unique_id: profile.map(|p| p.unique_id.clone()),
                state: profile.map(|p| p.state.clone()).filter(|s| !s.is_empty()),
                total_orders: base.acc.orders,
                total_revenue: base.acc.revenue,
                avg_order_value: base.acc.revenue / base.acc.orders as f64,
                first_order: base.first,
                last_order: base.last,
                recency_days: input.recency_days,
                lifetime_days,
                orders_per_month: orders_per_month(base.acc.orders, lifetime_days),
                clv,
                clv_category: ClvCategory::from_quartile(quartile),
                status: CustomerStatus::from_recency(input.recency_days),
                is_repeat: base.acc.orders > 1,
                avg_delivery_days: input.avg_delivery_days,
                delivery_reliability: reliability,
                avg_review_score: mean_of(&base.acc.review_scores),
                segment: segment_for(rfm),
                rfm,
            }
        })
        .collect();

    Ok(CustomerTable {
        customers,
        analysis_date,
        frequency_basis,
    })
}

/// Orders per month of customer lifetime; a single-day lifetime yields the order count
pub fn orders_per_month(orders: usize, lifetime_days: i64) -> f64 {
    if lifetime_days > 0 {
        orders as f64 / (lifetime_days as f64 / DAYS_PER_MONTH)
    } else {
        orders as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::records::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_days_between_floors() {
        assert_eq!(days_between(ts("2018-01-01 10:00:00"), ts("2018-01-03 09:59:59")), 1);
        assert_eq!(days_between(ts("2018-01-03 10:00:00"), ts("2018-01-01 10:00:00")), -2);
    }

    #[test]
    fn test_speed_and_accuracy_bins() {
        assert_eq!(DeliverySpeed::from_days(0.0), DeliverySpeed::VeryFast);
        assert_eq!(DeliverySpeed::from_days(7.0), DeliverySpeed::VeryFast);
        assert_eq!(DeliverySpeed::from_days(8.0), DeliverySpeed::Fast);
        assert_eq!(DeliverySpeed::from_days(30.0), DeliverySpeed::Slow);
        assert_eq!(DeliverySpeed::from_days(31.0), DeliverySpeed::VerySlow);
        assert_eq!(DeliveryAccuracy::from_delta(-7), DeliveryAccuracy::MuchEarlier);
        assert_eq!(DeliveryAccuracy::from_delta(0), DeliveryAccuracy::Earlier);
        assert_eq!(DeliveryAccuracy::from_delta(15), DeliveryAccuracy::VeryLate);
    }

    #[test]
    fn test_calendar_flags() {
        let cal = OrderCalendar::from_timestamp(ts("2017-11-25 14:30:00"));
        assert_eq!(cal.quarter, 4);
        assert_eq!(cal.weekday, 5, "2017-11-25 was a Saturday");
        assert!(cal.is_weekend);
        assert!(cal.is_holiday_season);
        assert!(!cal.is_carnival_season);
    }

    #[test]
    fn test_orders_per_month() {
        assert_eq!(orders_per_month(1, 0), 1.0);
        assert!((orders_per_month(2, 61) - 2.0 / (61.0 / DAYS_PER_MONTH)).abs() < 1e-12);
    }
}
