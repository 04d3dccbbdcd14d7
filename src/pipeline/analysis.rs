//! Runs every analysis over the cleaned tables
//!
//! Each result carries its own `DataResult` so a missing table only fails
//! the analyses that depend on it.

use serde::Serialize;

use super::cleaner::CleanedData;
use super::customers::{analyze_customers, CustomerReport};
use super::error::{DataError, DataResult};
use super::features::{build_customer_metrics, build_order_features, CustomerTable, OrderFeatures};
use super::forecast::{forecast_demand, ForecastConfig, ForecastReport};
use super::market::{analyze_market, MarketReport};
use super::overview::{analyze_overview, OverviewReport};
use super::payments::{analyze_payments, PaymentReport};
use super::rfm::FrequencyAxis;
use super::seasonal::{analyze_seasonality, SeasonalReport};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOptions {
    pub frequency_axis: FrequencyAxis,
    /// Trees in the forecast forests and the high-value classifier
    pub forest_trees: usize,
    pub seed: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            frequency_axis: FrequencyAxis::Auto,
            forest_trees: 100,
            seed: 42,
        }
    }
}

pub struct AnalysisResults {
    pub order_features: DataResult<Vec<OrderFeatures>>,
    pub customer_table: DataResult<CustomerTable>,
    pub overview: DataResult<OverviewReport>,
    pub customers: DataResult<CustomerReport>,
    pub seasonal: DataResult<SeasonalReport>,
    pub forecast: DataResult<ForecastReport>,
    pub market: DataResult<MarketReport>,
    pub payments: DataResult<PaymentReport>,
}

/// Per-order features need orders and items; reviews are optional
pub fn order_features(data: &CleanedData) -> DataResult<Vec<OrderFeatures>> {
    let orders = data.orders()?;
    let items = data.items()?;
    let reviews = data.reviews().unwrap_or_else(|err| {
        tracing::warn!(%err, "review scores unavailable");
        &[]
    });
    let features = build_order_features(orders, items, reviews);
    if features.is_empty() {
        return Err(DataError::empty_result("order features"));
    }
    Ok(features)
}

pub fn run_analysis(data: &CleanedData, options: &AnalysisOptions) -> AnalysisResults {
    let order_features = order_features(data);

    let customer_table = order_features.as_ref().map_err(Clone::clone).and_then(|orders| {
        build_customer_metrics(orders, data.customers()?, options.frequency_axis)
    });

    let overview = order_features.as_ref().map_err(Clone::clone).and_then(|orders| {
        analyze_overview(orders, data.customers()?, data.items().ok(), data.products().ok())
    });

    let customers = customer_table
        .as_ref()
        .map_err(Clone::clone)
        .and_then(|table| analyze_customers(table, options.forest_trees, options.seed));

    let seasonal = order_features.as_ref().map_err(Clone::clone).and_then(|orders| {
        analyze_seasonality(orders, data.items().ok(), data.products().ok())
    });

    let mut forecast_config = ForecastConfig::default();
    forecast_config.forest.n_trees = options.forest_trees;
    forecast_config.forest.seed = options.seed;
    let forecast = order_features
        .as_ref()
        .map_err(Clone::clone)
        .and_then(|orders| forecast_demand(orders, &forecast_config));

    let market = order_features.as_ref().map_err(Clone::clone).and_then(|orders| {
        analyze_market(data.customers()?, data.sellers().ok(), orders)
    });

    let payments = order_features.as_ref().map_err(Clone::clone).and_then(|orders| {
        analyze_payments(data.payments()?, orders, data.customers()?)
    });

    for (name, failure) in [
        ("overview", overview.as_ref().err()),
        ("customers", customers.as_ref().err()),
        ("seasonal", seasonal.as_ref().err()),
        ("forecast", forecast.as_ref().err()),
        ("market", market.as_ref().err()),
        ("payments", payments.as_ref().err()),
    ] {
        if let Some(err) = failure {
            tracing::warn!(analysis = name, %err, "analysis unavailable");
        }
    }

    AnalysisResults {
        order_features,
        customer_table,
        overview,
        customers,
        seasonal,
        forecast,
        market,
        payments,
    }
}
