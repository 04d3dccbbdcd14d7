//! Headline business KPIs

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::{DataError, DataResult};
use super::features::OrderFeatures;
use super::forecast::{monthly_series, MonthlyPoint};
use super::records::{Customer, OrderItem, Product};
use super::stats::mean;

const TOP_N: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub total_orders: usize,
    pub total_customers: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub avg_review_score: Option<f64>,
    pub delivered_pct: f64,
    pub on_time_pct: Option<f64>,
    pub avg_delivery_days: Option<f64>,
    pub first_purchase: String,
    pub last_purchase: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueShare {
    pub name: String,
    pub orders: usize,
    pub revenue: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub kpis: Kpis,
    pub top_states: Vec<RevenueShare>,
    /// Empty when items or products are unavailable
    pub top_categories: Vec<RevenueShare>,
    pub monthly_trend: Vec<MonthlyPoint>,
}

fn top_shares(totals: HashMap<&str, (usize, f64)>, grand_total: f64) -> Vec<RevenueShare> {
    let mut shares: Vec<RevenueShare> = totals
        .into_iter()
        .map(|(name, (orders, revenue))| RevenueShare {
            name: name.to_string(),
            orders,
            revenue,
            share_pct: if grand_total > 0.0 {
                revenue / grand_total * 100.0
            } else {
                0.0
            },
        })
        .collect();
    shares.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    shares.truncate(TOP_N);
    shares
}

pub fn revenue_by_state(orders: &[OrderFeatures], customers: &[Customer]) -> Vec<RevenueShare> {
    let state_of: HashMap<&str, &str> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c.state.as_str()))
        .collect();
    let mut totals: HashMap<&str, (usize, f64)> = HashMap::new();
    for order in orders {
        let state = state_of
            .get(order.customer_id.as_str())
            .copied()
            .unwrap_or("unknown");
        let entry = totals.entry(state).or_default();
        entry.0 += 1;
        entry.1 += order.order_value;
    }
    let grand_total = orders.iter().map(|o| o.order_value).sum();
    top_shares(totals, grand_total)
}

/// Item revenue (price only) per product category; an order counts once per category
pub fn revenue_by_category(items: &[OrderItem], products: &[Product]) -> Vec<RevenueShare> {
    let category_of: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.product_id.as_str(), p.display_category()))
        .collect();
    let mut totals: HashMap<&str, (usize, f64)> = HashMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for item in items {
        let category = category_of
            .get(item.product_id.as_str())
            .copied()
            .unwrap_or("unknown");
        let entry = totals.entry(category).or_default();
        if seen.insert((category, item.order_id.as_str())) {
            entry.0 += 1;
        }
        entry.1 += item.price;
    }
    let grand_total = items.iter().map(|i| i.price).sum();
    top_shares(totals, grand_total)
}

pub fn analyze_overview(
    orders: &[OrderFeatures],
    customers: &[Customer],
    items: Option<&[OrderItem]>,
    products: Option<&[Product]>,
) -> DataResult<OverviewReport> {
    if orders.is_empty() {
        return Err(DataError::empty_result("overview"));
    }
    let total_revenue: f64 = orders.iter().map(|o| o.order_value).sum();
    let delivered = orders.iter().filter(|o| o.status == "delivered").count();
    let reviews: Vec<f64> = orders.iter().filter_map(|o| o.review_score).collect();
    let on_time: Vec<f64> = orders
        .iter()
        .filter_map(|o| o.on_time)
        .map(|b| if b { 100.0 } else { 0.0 })
        .collect();
    let delivery_days: Vec<f64> = orders
        .iter()
        .filter_map(|o| o.delivery_days)
        .map(|d| d as f64)
        .collect();
    let distinct_customers: HashSet<&str> = orders.iter().map(|o| o.customer_id.as_str()).collect();
    let day = |ts: Option<NaiveDateTime>| {
        ts.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_default()
    };

    let kpis = Kpis {
        total_orders: orders.len(),
        total_customers: distinct_customers.len(),
        total_revenue,
        avg_order_value: total_revenue / orders.len() as f64,
        avg_review_score: mean(&reviews),
        delivered_pct: delivered as f64 / orders.len() as f64 * 100.0,
        on_time_pct: mean(&on_time),
        avg_delivery_days: mean(&delivery_days),
        first_purchase: day(orders.iter().map(|o| o.purchased_at).min()),
        last_purchase: day(orders.iter().map(|o| o.purchased_at).max()),
    };

    let top_categories = match (items, products) {
        (Some(items), Some(products)) => revenue_by_category(items, products),
        _ => Vec::new(),
    };

    Ok(OverviewReport {
        kpis,
        top_states: revenue_by_state(orders, customers),
        top_categories,
        monthly_trend: monthly_series(orders),
    })
}
