//! Market expansion scoring per Brazilian state
//!
//! State metrics are built from customers, sellers and order features, then
//! enriched with the reference table in [`crate::pipeline::states`]. Four
//! sub-scores in [0, 1] are combined with fixed weights into an opportunity
//! score and the states are ranked by it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use super::error::{DataError, DataResult};
use super::features::OrderFeatures;
use super::records::{Customer, Seller};
use super::stats::mean;
use super::states::state_profile;

/// Customers per seller considered sustainable
const OPTIMAL_CUSTOMERS_PER_SELLER: f64 = 30.0;
const SELLER_SHORTAGE_RATIO: f64 = 50.0;
const ECONOMIC_FACTOR_CAP: f64 = 2.0;
const NEUTRAL_COMPETITIVE_SCORE: f64 = 0.5;

pub const SIZE_WEIGHT: f64 = 0.35;
pub const GROWTH_WEIGHT: f64 = 0.30;
pub const OPERATIONAL_WEIGHT: f64 = 0.20;
pub const COMPETITIVE_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PenetrationLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
}

impl PenetrationLevel {
    pub fn from_customers(customers: usize) -> Self {
        match customers {
            0..=100 => PenetrationLevel::VeryLow,
            101..=1000 => PenetrationLevel::Low,
            1001..=5000 => PenetrationLevel::Medium,
            _ => PenetrationLevel::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PenetrationLevel::VeryLow => "Very Low",
            PenetrationLevel::Low => "Low",
            PenetrationLevel::Medium => "Medium",
            PenetrationLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryPerformance {
    #[serde(rename = "Excellent (<10d)")]
    Excellent,
    #[serde(rename = "Good (10-15d)")]
    Good,
    #[serde(rename = "Average (15-20d)")]
    Average,
    #[serde(rename = "Poor (20-25d)")]
    Poor,
    #[serde(rename = "Very Poor (>25d)")]
    VeryPoor,
}

impl DeliveryPerformance {
    pub fn from_days(days: f64) -> Self {
        if days <= 10.0 {
            DeliveryPerformance::Excellent
        } else if days <= 15.0 {
            DeliveryPerformance::Good
        } else if days <= 20.0 {
            DeliveryPerformance::Average
        } else if days <= 25.0 {
            DeliveryPerformance::Poor
        } else {
            DeliveryPerformance::VeryPoor
        }
    }
}

/// Observed activity of one state
#[derive(Debug, Clone, Serialize)]
pub struct StateMetrics {
    pub state: String,
    pub customers: usize,
    pub sellers: usize,
    pub orders: usize,
    pub revenue: f64,
    pub revenue_per_customer: f64,
    pub orders_per_customer: f64,
    /// Customers per seller, or the customer count when there are no sellers
    pub customer_to_seller_ratio: f64,
    pub avg_delivery_days: Option<f64>,
    pub on_time_rate: Option<f64>,
    pub penetration_level: PenetrationLevel,
    pub delivery_performance: Option<DeliveryPerformance>,
}

#[derive(Default)]
struct StateAccumulator {
    customers: usize,
    sellers: usize,
    orders: usize,
    revenue: f64,
    delivery_days: Vec<f64>,
    on_time: Vec<f64>,
}

/// Aggregate customers, sellers and orders by state. Orders are attributed to
/// the state of their customer; orders of unknown customers are skipped.
pub fn state_metrics(
    customers: &[Customer],
    sellers: &[Seller],
    orders: &[OrderFeatures],
) -> Vec<StateMetrics> {
    let mut states: BTreeMap<String, StateAccumulator> = BTreeMap::new();
    let mut state_of: HashMap<&str, &str> = HashMap::with_capacity(customers.len());

    for customer in customers {
        let state = customer.state.trim().to_uppercase();
        states.entry(state).or_default().customers += 1;
        state_of.insert(customer.customer_id.as_str(), customer.state.trim());
    }
    for seller in sellers {
        states
            .entry(seller.state.trim().to_uppercase())
            .or_default()
            .sellers += 1;
    }

    let mut skipped = 0usize;
    for order in orders {
        let Some(state) = state_of.get(order.customer_id.as_str()) else {
            skipped += 1;
            continue;
        };
        let acc = states.entry(state.to_uppercase()).or_default();
        acc.orders += 1;
        acc.revenue += order.order_value;
        if let Some(days) = order.delivery_days {
            acc.delivery_days.push(days as f64);
        }
        if let Some(on_time) = order.on_time {
            acc.on_time.push(if on_time { 1.0 } else { 0.0 });
        }
    }
    if skipped > 0 {
        tracing::warn!(orders = skipped, "orders without a known customer state were skipped");
    }

    states
        .into_iter()
        .map(|(state, acc)| {
            let per_customer = |v: f64| {
                if acc.customers > 0 {
                    v / acc.customers as f64
                } else {
                    0.0
                }
            };
            let avg_delivery_days = mean(&acc.delivery_days);
            StateMetrics {
                state,
                customers: acc.customers,
                sellers: acc.sellers,
                orders: acc.orders,
                revenue: acc.revenue,
                revenue_per_customer: per_customer(acc.revenue),
                orders_per_customer: per_customer(acc.orders as f64),
                customer_to_seller_ratio: if acc.sellers > 0 {
                    acc.customers as f64 / acc.sellers as f64
                } else {
                    acc.customers as f64
                },
                avg_delivery_days,
                on_time_rate: mean(&acc.on_time),
                penetration_level: PenetrationLevel::from_customers(acc.customers),
                delivery_performance: avg_delivery_days.map(DeliveryPerformance::from_days),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpansionPriority {
    #[serde(rename = "Optimization Priority")]
    OptimizationPriority,
    #[serde(rename = "Maintain & Optimize")]
    MaintainAndOptimize,
    #[serde(rename = "High Priority")]
    High,
    #[serde(rename = "Medium Priority")]
    Medium,
    #[serde(rename = "Low Priority")]
    Low,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl ExpansionPriority {
    /// Tier 1 states are optimised rather than expanded into; unknown tiers
    /// follow the tier 3 rules
    pub fn classify(tier: Option<u8>, score: f64, population: u64) -> Self {
        match tier {
            Some(1) => {
                if score >= 0.6 {
                    ExpansionPriority::OptimizationPriority
                } else {
                    ExpansionPriority::MaintainAndOptimize
                }
            }
            Some(2) => {
                if score >= 0.7 {
                    ExpansionPriority::High
                } else if score >= 0.5 {
                    ExpansionPriority::Medium
                } else {
                    ExpansionPriority::Low
                }
            }
            _ => {
                if score >= 0.6 && population > 2_000_000 {
                    ExpansionPriority::Medium
                } else if score >= 0.4 && population > 1_000_000 {
                    ExpansionPriority::Low
                } else {
                    ExpansionPriority::NotRecommended
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExpansionPriority::OptimizationPriority => "Optimization Priority",
            ExpansionPriority::MaintainAndOptimize => "Maintain & Optimize",
            ExpansionPriority::High => "High Priority",
            ExpansionPriority::Medium => "Medium Priority",
            ExpansionPriority::Low => "Low Priority",
            ExpansionPriority::NotRecommended => "Not Recommended",
        }
    }
}

impl fmt::Display for ExpansionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateOpportunity {
    pub metrics: StateMetrics,
    /// None for codes missing from the reference table
    pub tier: Option<u8>,
    pub population: u64,
    pub gdp_per_capita: f64,
    pub urban_rate: f64,
    pub urban_population: f64,
    /// Customers per 1000 urban inhabitants
    pub penetration_rate: f64,
    pub benchmark_penetration: f64,
    pub untapped_customers: f64,
    pub economic_factor: f64,
    pub adjusted_untapped_customers: f64,
    pub untapped_revenue: f64,
    pub optimal_sellers: u64,
    pub seller_gap: u64,
    pub seller_oversupply: u64,
    pub seller_efficiency: f64,
    pub seller_shortage: bool,
    pub market_size_score: f64,
    pub growth_score: f64,
    pub operational_score: f64,
    pub competitive_score: f64,
    pub opportunity_score: f64,
    pub priority: ExpansionPriority,
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

/// Score and rank every state, highest opportunity first with ties broken
/// by state code. Without seller data the competitive score is neutral.
pub fn score_opportunities(metrics: Vec<StateMetrics>, sellers_known: bool) -> Vec<StateOpportunity> {
    struct Base {
        metrics: StateMetrics,
        tier: Option<u8>,
        population: u64,
        gdp: f64,
        urban_rate: f64,
        urban_population: f64,
        penetration: f64,
    }

    let bases: Vec<Base> = metrics
        .into_iter()
        .map(|m| {
            let profile = state_profile(&m.state);
            let population = profile.map_or(0, |p| p.population);
            let urban_rate = profile.map_or(0.0, |p| p.urban_rate);
            let urban_population = population as f64 * urban_rate;
            Base {
                tier: profile.map(|p| p.tier),
                population,
                gdp: profile.map_or(0.0, |p| p.gdp_per_capita),
                urban_rate,
                urban_population,
                penetration: ratio(m.customers as f64, urban_population) * 1000.0,
                metrics: m,
            }
        })
        .collect();

    let mut tier_totals: HashMap<u8, (f64, f64)> = HashMap::new();
    for b in &bases {
        if let Some(tier) = b.tier {
            let entry = tier_totals.entry(tier).or_insert((0.0, 0.0));
            entry.0 += b.metrics.customers as f64;
            entry.1 += b.urban_population;
        }
    }
    let benchmark = |tier: Option<u8>| {
        tier.and_then(|t| tier_totals.get(&t))
            .map_or(0.0, |(customers, urban)| ratio(*customers, *urban) * 1000.0)
    };

    let known_gdp: Vec<f64> = bases.iter().filter(|b| b.tier.is_some()).map(|b| b.gdp).collect();
    let mean_gdp = mean(&known_gdp).unwrap_or(0.0);
    let total_customers: usize = bases.iter().map(|b| b.metrics.customers).sum();
    let total_revenue: f64 = bases.iter().map(|b| b.metrics.revenue).sum();
    let avg_revenue_per_customer = ratio(total_revenue, total_customers as f64);

    struct Potential {
        benchmark: f64,
        untapped: f64,
        economic_factor: f64,
        adjusted: f64,
        revenue: f64,
    }
    let potentials: Vec<Potential> = bases
        .iter()
        .map(|b| {
            let bench = benchmark(b.tier);
            let untapped = (bench * b.urban_population / 1000.0 - b.metrics.customers as f64).max(0.0);
            let economic_factor = ratio(b.gdp, mean_gdp).min(ECONOMIC_FACTOR_CAP);
            let adjusted = untapped * economic_factor;
            Potential {
                benchmark: bench,
                untapped,
                economic_factor,
                adjusted,
                revenue: adjusted * avg_revenue_per_customer * economic_factor,
            }
        })
        .collect();

    let max_population = max_of(bases.iter().map(|b| b.population as f64));
    let max_gdp = max_of(bases.iter().map(|b| b.gdp));
    let max_untapped_revenue = max_of(potentials.iter().map(|p| p.revenue));
    let max_penetration = max_of(bases.iter().map(|b| b.penetration));
    let max_delivery = max_of(bases.iter().filter_map(|b| b.metrics.avg_delivery_days));

    let mut scored: Vec<StateOpportunity> = bases
        .into_iter()
        .zip(potentials)
        .map(|(b, p)| {
            let customers = b.metrics.customers as f64;
            let sellers = b.metrics.sellers as u64;
            let optimal_sellers = (customers / OPTIMAL_CUSTOMERS_PER_SELLER).ceil() as u64;
            let seller_efficiency = if optimal_sellers > 0 {
                (sellers as f64 / optimal_sellers as f64).min(1.0)
            } else {
                1.0
            };

            let market_size_score =
                0.6 * ratio(b.population as f64, max_population) + 0.4 * ratio(b.gdp, max_gdp);
            let penetration_headroom = if max_penetration > 0.0 {
                1.0 - b.penetration / max_penetration
            } else {
                0.0
            };
            let growth_score = 0.7 * ratio(p.revenue, max_untapped_revenue) + 0.3 * penetration_headroom;
            let delivery_score = match b.metrics.avg_delivery_days {
                Some(days) if max_delivery > 0.0 => 1.0 - days / max_delivery,
                Some(_) => 1.0,
                None => 0.0,
            };
            let operational_score = 0.6 * delivery_score + 0.4 * b.urban_rate;
            let competitive_score = if sellers_known {
                seller_efficiency
            } else {
                NEUTRAL_COMPETITIVE_SCORE
            };

            let opportunity_score = (SIZE_WEIGHT * market_size_score
                + GROWTH_WEIGHT * growth_score
                + OPERATIONAL_WEIGHT * operational_score
                + COMPETITIVE_WEIGHT * competitive_score)
                .clamp(0.0, 1.0);

            StateOpportunity {
                tier: b.tier,
                population: b.population,
                gdp_per_capita: b.gdp,
                urban_rate: b.urban_rate,
                urban_population: b.urban_population,
                penetration_rate: b.penetration,
                benchmark_penetration: p.benchmark,
                untapped_customers: p.untapped,
                economic_factor: p.economic_factor,
                adjusted_untapped_customers: p.adjusted,
                untapped_revenue: p.revenue,
                optimal_sellers,
                seller_gap: optimal_sellers.saturating_sub(sellers),
                seller_oversupply: sellers.saturating_sub(optimal_sellers),
                seller_efficiency,
                seller_shortage: b.metrics.customer_to_seller_ratio > SELLER_SHORTAGE_RATIO,
                market_size_score,
                growth_score,
                operational_score,
                competitive_score,
                opportunity_score,
                priority: ExpansionPriority::classify(b.tier, opportunity_score, b.population),
                metrics: b.metrics,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.opportunity_score
            .partial_cmp(&a.opportunity_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.metrics.state.cmp(&b.metrics.state))
    });
    scored
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityCount {
    pub priority: ExpansionPriority,
    pub states: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub states_analyzed: usize,
    pub total_untapped_revenue: f64,
    pub total_seller_gap: u64,
    pub shortage_states: Vec<String>,
    /// States without an entry in the reference table
    pub unknown_states: Vec<String>,
    pub priorities: Vec<PriorityCount>,
    pub opportunities: Vec<StateOpportunity>,
}

pub fn analyze_market(
    customers: &[Customer],
    sellers: Option<&[Seller]>,
    orders: &[OrderFeatures],
) -> DataResult<MarketReport> {
    let metrics = state_metrics(customers, sellers.unwrap_or_default(), orders);
    if metrics.is_empty() {
        return Err(DataError::empty_result("market expansion"));
    }
    let opportunities = score_opportunities(metrics, sellers.is_some());

    let mut priorities: Vec<PriorityCount> = Vec::new();
    for opp in &opportunities {
        match priorities.iter_mut().find(|p| p.priority == opp.priority) {
            Some(entry) => entry.states += 1,
            None => priorities.push(PriorityCount {
                priority: opp.priority,
                states: 1,
            }),
        }
    }

    let unknown_states: BTreeSet<String> = opportunities
        .iter()
        .filter(|o| o.tier.is_none())
        .map(|o| o.metrics.state.clone())
        .collect();
    if !unknown_states.is_empty() {
        tracing::warn!(states = ?unknown_states, "states missing from the reference table");
    }

    Ok(MarketReport {
        states_analyzed: opportunities.len(),
        total_untapped_revenue: opportunities.iter().map(|o| o.untapped_revenue).sum(),
        total_seller_gap: opportunities.iter().map(|o| o.seller_gap).sum(),
        shortage_states: opportunities
            .iter()
            .filter(|o| o.seller_shortage)
            .map(|o| o.metrics.state.clone())
            .collect(),
        unknown_states: unknown_states.into_iter().collect(),
        priorities,
        opportunities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penetration_levels() {
        assert_eq!(PenetrationLevel::from_customers(0), PenetrationLevel::VeryLow);
        assert_eq!(PenetrationLevel::from_customers(100), PenetrationLevel::VeryLow);
        assert_eq!(PenetrationLevel::from_customers(101), PenetrationLevel::Low);
        assert_eq!(PenetrationLevel::from_customers(5000), PenetrationLevel::Medium);
        assert_eq!(PenetrationLevel::from_customers(5001), PenetrationLevel::High);
    }

    #[test]
    fn test_priority_rules() {
        assert_eq!(
            ExpansionPriority::classify(Some(1), 0.65, 10),
            ExpansionPriority::OptimizationPriority
        );
        assert_eq!(
            ExpansionPriority::classify(Some(2), 0.55, 10),
            ExpansionPriority::Medium
        );
        assert_eq!(
            ExpansionPriority::classify(Some(3), 0.65, 1_500_000),
            ExpansionPriority::Low
        );
        assert_eq!(
            ExpansionPriority::classify(None, 0.9, 500),
            ExpansionPriority::NotRecommended
        );
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total = SIZE_WEIGHT + GROWTH_WEIGHT + OPERATIONAL_WEIGHT + COMPETITIVE_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }
}
