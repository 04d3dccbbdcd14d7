//! Seasonal intelligence: calendar-month buckets, variation, holiday impact
//! and per-category seasonality

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use super::error::{DataError, DataResult};
use super::features::OrderFeatures;
use super::records::{OrderItem, Product};
use super::stats::{coefficient_of_variation, mean, pct_delta, sample_std};

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("?")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ImpactLevel {
    pub fn score(&self) -> f64 {
        match self {
            ImpactLevel::Low => 1.0,
            ImpactLevel::Medium => 2.0,
            ImpactLevel::High => 3.0,
            ImpactLevel::VeryHigh => 4.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::VeryHigh => "very high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Holiday,
    Cultural,
    Commercial,
    Seasonal,
}

/// The main Brazilian retail event of a calendar month
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BrazilianEvent {
    pub month: u32,
    pub name: &'static str,
    pub kind: EventKind,
    pub expected_impact: ImpactLevel,
}

pub const BRAZILIAN_EVENTS: [BrazilianEvent; 12] = [
    BrazilianEvent { month: 1, name: "New Year", kind: EventKind::Holiday, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 2, name: "Carnival", kind: EventKind::Cultural, expected_impact: ImpactLevel::High },
    BrazilianEvent { month: 3, name: "Carnival (extended)", kind: EventKind::Cultural, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 4, name: "Easter", kind: EventKind::Holiday, expected_impact: ImpactLevel::Low },
    BrazilianEvent { month: 5, name: "Mothers Day", kind: EventKind::Commercial, expected_impact: ImpactLevel::High },
    BrazilianEvent { month: 6, name: "Valentines Day (Brazil)", kind: EventKind::Commercial, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 7, name: "Winter Vacation", kind: EventKind::Seasonal, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 8, name: "Fathers Day", kind: EventKind::Commercial, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 9, name: "Independence Day", kind: EventKind::Holiday, expected_impact: ImpactLevel::Low },
    BrazilianEvent { month: 10, name: "Childrens Day", kind: EventKind::Commercial, expected_impact: ImpactLevel::Medium },
    BrazilianEvent { month: 11, name: "Black Friday", kind: EventKind::Commercial, expected_impact: ImpactLevel::VeryHigh },
    BrazilianEvent { month: 12, name: "Christmas", kind: EventKind::Holiday, expected_impact: ImpactLevel::VeryHigh },
];

pub fn event_for_month(month: u32) -> &'static BrazilianEvent {
    let idx = (month.clamp(1, 12) - 1) as usize;
    &BRAZILIAN_EVENTS[idx]
}

/// Revenue and orders of one calendar month pooled across years
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyBucket {
    pub month: u32,
    pub month_name: &'static str,
    pub revenue: f64,
    pub orders: usize,
    pub avg_order_value: f64,
    pub unique_customers: usize,
    /// Distinct years contributing orders to this month
    pub years_covered: usize,
}

/// Group orders by calendar month irrespective of year; all 12 buckets are returned
pub fn monthly_buckets(orders: &[OrderFeatures]) -> Vec<MonthlyBucket> {
    let mut revenue = [0.0f64; 12];
    let mut counts = [0usize; 12];
    let mut customers: Vec<HashSet<&str>> = vec![HashSet::new(); 12];
    let mut years: Vec<BTreeSet<i32>> = vec![BTreeSet::new(); 12];

    for order in orders {
        let idx = (order.calendar.month - 1) as usize;
        revenue[idx] += order.order_value;
        counts[idx] += 1;
        customers[idx].insert(order.customer_id.as_str());
        years[idx].insert(order.calendar.year);
    }

    (0..12)
        .map(|idx| MonthlyBucket {
            month: idx as u32 + 1,
            month_name: MONTH_NAMES[idx],
            revenue: revenue[idx],
            orders: counts[idx],
            avg_order_value: if counts[idx] > 0 {
                revenue[idx] / counts[idx] as f64
            } else {
                0.0
            },
            unique_customers: customers[idx].len(),
            years_covered: years[idx].len(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct VariationSummary {
    pub revenue_mean: f64,
    pub revenue_std: f64,
    pub revenue_cv: f64,
    pub orders_mean: f64,
    pub orders_std: f64,
    pub orders_cv: f64,
    pub peak_revenue_month: u32,
    pub trough_revenue_month: u32,
    pub peak_orders_month: u32,
    pub trough_orders_month: u32,
}

fn arg_extreme(values: &[f64], want_max: bool) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        let better = if want_max { *v > values[best] } else { *v < values[best] };
        if better {
            best = i;
        }
    }
    best
}

/// Coefficient of variation (sample std / mean) across the 12 buckets
pub fn variation(buckets: &[MonthlyBucket]) -> VariationSummary {
    let revenue: Vec<f64> = buckets.iter().map(|b| b.revenue).collect();
    let orders: Vec<f64> = buckets.iter().map(|b| b.orders as f64).collect();
    let month_at = |i: usize| buckets.get(i).map_or(1, |b| b.month);
    VariationSummary {
        revenue_mean: mean(&revenue).unwrap_or(0.0),
        revenue_std: sample_std(&revenue).unwrap_or(0.0),
        revenue_cv: coefficient_of_variation(&revenue),
        orders_mean: mean(&orders).unwrap_or(0.0),
        orders_std: sample_std(&orders).unwrap_or(0.0),
        orders_cv: coefficient_of_variation(&orders),
        peak_revenue_month: month_at(arg_extreme(&revenue, true)),
        trough_revenue_month: month_at(arg_extreme(&revenue, false)),
        peak_orders_month: month_at(arg_extreme(&orders, true)),
        trough_orders_month: month_at(arg_extreme(&orders, false)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HolidayImpact {
    pub month: u32,
    pub event: &'static str,
    pub kind: EventKind,
    pub expected_impact: ImpactLevel,
    pub revenue: f64,
    pub orders: usize,
    /// Percentage delta against the mean monthly revenue, without significance testing
    pub revenue_vs_average_pct: f64,
    pub orders_vs_average_pct: f64,
    pub years_covered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HolidayImpactReport {
    /// Sorted by revenue delta, strongest month first
    pub months: Vec<HolidayImpact>,
    /// Months are covered by different numbers of years, which inflates
    /// or deflates their deltas
    pub uneven_coverage: bool,
}

pub fn holiday_impact(buckets: &[MonthlyBucket]) -> HolidayImpactReport {
    let revenue: Vec<f64> = buckets.iter().map(|b| b.revenue).collect();
    let orders: Vec<f64> = buckets.iter().map(|b| b.orders as f64).collect();
    let revenue_mean = mean(&revenue).unwrap_or(0.0);
    let orders_mean = mean(&orders).unwrap_or(0.0);

    let mut months: Vec<HolidayImpact> = buckets
        .iter()
        .map(|b| {
            let event = event_for_month(b.month);
            HolidayImpact {
                month: b.month,
                event: event.name,
                kind: event.kind,
                expected_impact: event.expected_impact,
                revenue: b.revenue,
                orders: b.orders,
                revenue_vs_average_pct: pct_delta(b.revenue, revenue_mean),
                orders_vs_average_pct: pct_delta(b.orders as f64, orders_mean),
                years_covered: b.years_covered,
            }
        })
        .collect();
    months.sort_by(|a, b| {
        b.revenue_vs_average_pct
            .partial_cmp(&a.revenue_vs_average_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.month.cmp(&b.month))
    });

    let coverage: BTreeSet<usize> = buckets
        .iter()
        .filter(|b| b.orders > 0)
        .map(|b| b.years_covered)
        .collect();

    HolidayImpactReport {
        months,
        uneven_coverage: coverage.len() > 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    /// Southern hemisphere seasons
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Summer,
            3..=5 => Season::Autumn,
            6..=8 => Season::Winter,
            _ => Season::Spring,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonTotal {
    pub season: Season,
    pub revenue: f64,
    pub orders: usize,
    pub revenue_share_pct: f64,
}

pub fn season_totals(buckets: &[MonthlyBucket]) -> Vec<SeasonTotal> {
    let total: f64 = buckets.iter().map(|b| b.revenue).sum();
    [Season::Summer, Season::Autumn, Season::Winter, Season::Spring]
        .into_iter()
        .map(|season| {
            let members = buckets.iter().filter(|b| Season::from_month(b.month) == season);
            let (revenue, orders) = members.fold((0.0, 0), |(r, o), b| (r + b.revenue, o + b.orders));
            SeasonTotal {
                season,
                revenue,
                orders,
                revenue_share_pct: if total > 0.0 { revenue / total * 100.0 } else { 0.0 },
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeasonalityLevel {
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl SeasonalityLevel {
    pub fn from_cv(cv: f64) -> Self {
        if cv < 0.3 {
            SeasonalityLevel::Low
        } else if cv < 0.6 {
            SeasonalityLevel::Moderate
        } else if cv < 1.0 {
            SeasonalityLevel::High
        } else {
            SeasonalityLevel::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySeasonality {
    pub category: String,
    pub total_revenue: f64,
    pub avg_monthly_revenue: f64,
    pub cv: f64,
    pub level: SeasonalityLevel,
    pub peak_month: u32,
    pub peak_to_trough: Option<f64>,
}

/// Seasonality of item revenue per product category, most seasonal first.
///
/// Only months in which a category sold are considered, so the trough is
/// its weakest selling month.
pub fn category_seasonality(
    orders: &[OrderFeatures],
    items: &[OrderItem],
    products: &[Product],
) -> Vec<CategorySeasonality> {
    let month_of: HashMap<&str, u32> = orders
        .iter()
        .map(|o| (o.order_id.as_str(), o.calendar.month))
        .collect();
    let category_of: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.product_id.as_str(), p.display_category()))
        .collect();

    let mut by_category: BTreeMap<&str, BTreeMap<u32, f64>> = BTreeMap::new();
    for item in items {
        let Some(month) = month_of.get(item.order_id.as_str()) else {
            continue;
        };
        let category = category_of
            .get(item.product_id.as_str())
            .copied()
            .unwrap_or("unknown");
        *by_category
            .entry(category)
            .or_default()
            .entry(*month)
            .or_insert(0.0) += item.price;
    }

    let mut rows: Vec<CategorySeasonality> = by_category
        .into_iter()
        .map(|(category, months)| {
            let values: Vec<f64> = months.values().copied().collect();
            let (peak_month, peak) = months
                .iter()
                .fold((0u32, f64::MIN), |acc, (m, v)| if *v > acc.1 { (*m, *v) } else { acc });
            let trough = values.iter().copied().fold(f64::INFINITY, f64::min);
            let cv = coefficient_of_variation(&values);
            CategorySeasonality {
                category: category.to_string(),
                total_revenue: values.iter().sum(),
                avg_monthly_revenue: mean(&values).unwrap_or(0.0),
                cv,
                level: SeasonalityLevel::from_cv(cv),
                peak_month,
                peak_to_trough: (trough > 0.0).then(|| peak / trough),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.cv.partial_cmp(&a.cv)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonalReport {
    pub total_revenue: f64,
    pub buckets: Vec<MonthlyBucket>,
    pub variation: VariationSummary,
    pub holiday_impact: HolidayImpactReport,
    pub seasons: Vec<SeasonTotal>,
    /// Empty when items or products are unavailable
    pub categories: Vec<CategorySeasonality>,
}

pub fn analyze_seasonality(
    orders: &[OrderFeatures],
    items: Option<&[OrderItem]>,
    products: Option<&[Product]>,
) -> DataResult<SeasonalReport> {
    if orders.is_empty() {
        return Err(DataError::empty_result("seasonal analysis"));
    }
    let buckets = monthly_buckets(orders);
    let categories = match (items, products) {
        (Some(items), Some(products)) => category_seasonality(orders, items, products),
        _ => Vec::new(),
    };
    Ok(SeasonalReport {
        total_revenue: orders.iter().map(|o| o.order_value).sum(),
        variation: variation(&buckets),
        holiday_impact: holiday_impact(&buckets),
        seasons: season_totals(&buckets),
        buckets,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seasons_follow_southern_hemisphere() {
        assert_eq!(Season::from_month(1), Season::Summer);
        assert_eq!(Season::from_month(12), Season::Summer);
        assert_eq!(Season::from_month(4), Season::Autumn);
        assert_eq!(Season::from_month(7), Season::Winter);
        assert_eq!(Season::from_month(10), Season::Spring);
    }

    #[test]
    fn test_seasonality_levels() {
        assert_eq!(SeasonalityLevel::from_cv(0.1), SeasonalityLevel::Low);
        assert_eq!(SeasonalityLevel::from_cv(0.3), SeasonalityLevel::Moderate);
        assert_eq!(SeasonalityLevel::from_cv(0.99), SeasonalityLevel::High);
        assert_eq!(SeasonalityLevel::from_cv(1.5), SeasonalityLevel::VeryHigh);
    }

    #[test]
    fn test_event_calendar() {
        assert_eq!(event_for_month(11).name, "Black Friday");
        assert_eq!(event_for_month(12).expected_impact.score(), 4.0);
        assert_eq!(month_name(2), "Feb");
    }
}
