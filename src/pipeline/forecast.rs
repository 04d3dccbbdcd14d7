//! Three-month demand forecast from the monthly revenue and order series

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::Serialize;

use super::error::{DataError, DataResult};
use super::features::OrderFeatures;
use super::forest::{regression_metrics, ForestConfig, RandomForest, RegressionMetrics};
use super::seasonal::{event_for_month, month_name};

/// 95% normal interval multiplier applied to the tree spread
const Z_95: f64 = 1.96;
const MIN_TRAINING_ROWS: usize = 10;
const LAGS: usize = 3;

pub const FEATURE_NAMES: [&str; 11] = [
    "month",
    "quarter",
    "month_sin",
    "month_cos",
    "holiday_impact",
    "revenue_lag_1",
    "revenue_lag_2",
    "revenue_lag_3",
    "orders_lag_1",
    "orders_lag_2",
    "orders_lag_3",
];

/// Revenue and order count of one (year, month)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
    pub orders: f64,
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Chronological monthly series; months without orders between the first
/// and last active month are present with zeros
pub fn monthly_series(orders: &[OrderFeatures]) -> Vec<MonthlyPoint> {
    let mut totals: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();
    for order in orders {
        let entry = totals
            .entry((order.calendar.year, order.calendar.month))
            .or_insert((0.0, 0.0));
        entry.0 += order.order_value;
        entry.1 += 1.0;
    }

    let (Some(first), Some(last)) = (
        totals.keys().next().copied(),
        totals.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        let (revenue, count) = totals.get(&cursor).copied().unwrap_or((0.0, 0.0));
        series.push(MonthlyPoint {
            year: cursor.0,
            month: cursor.1,
            revenue,
            orders: count,
        });
        cursor = next_month(cursor.0, cursor.1);
    }
    series
}

/// Feature vector for a month given the three preceding values of each
/// target, most recent first
pub fn feature_row(month: u32, revenue_lags: &[f64; LAGS], order_lags: &[f64; LAGS]) -> Vec<f64> {
    let angle = 2.0 * PI * f64::from(month) / 12.0;
    let mut row = vec![
        f64::from(month),
        f64::from((month - 1) / 3 + 1),
        angle.sin(),
        angle.cos(),
        event_for_month(month).expected_impact.score(),
    ];
    row.extend_from_slice(revenue_lags);
    row.extend_from_slice(order_lags);
    row
}

struct TrainingSet {
    x: Vec<Vec<f64>>,
    revenue: Vec<f64>,
    orders: Vec<f64>,
}

fn lags_before(series: &[MonthlyPoint], idx: usize, value: fn(&MonthlyPoint) -> f64) -> [f64; LAGS] {
    [value(&series[idx - 1]), value(&series[idx - 2]), value(&series[idx - 3])]
}

fn training_set(series: &[MonthlyPoint]) -> TrainingSet {
    let mut set = TrainingSet {
        x: Vec::new(),
        revenue: Vec::new(),
        orders: Vec::new(),
    };
    for idx in LAGS..series.len() {
        let point = &series[idx];
        let revenue_lags = lags_before(series, idx, |p| p.revenue);
        let order_lags = lags_before(series, idx, |p| p.orders);
        set.x.push(feature_row(point.month, &revenue_lags, &order_lags));
        set.revenue.push(point.revenue);
        set.orders.push(point.orders);
    }
    set
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastConfig {
    pub horizon: usize,
    pub train_fraction: f64,
    pub forest: ForestConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 3,
            train_fraction: 0.8,
            forest: ForestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub revenue: f64,
    pub revenue_lower: f64,
    pub revenue_upper: f64,
    pub orders: f64,
    pub orders_lower: f64,
    pub orders_upper: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub target: &'static str,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Hold-out error; absent when the split leaves no test rows
    pub metrics: Option<RegressionMetrics>,
    pub feature_importances: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub history: Vec<MonthlyPoint>,
    pub training_rows: usize,
    pub revenue_model: ModelEvaluation,
    pub orders_model: ModelEvaluation,
    pub forecast: Vec<ForecastPoint>,
}

fn fit_and_score(
    target: &'static str,
    x: &[Vec<f64>],
    y: &[f64],
    split: usize,
    config: &ForestConfig,
) -> DataResult<(RandomForest, ModelEvaluation)> {
    let forest = RandomForest::fit(&x[..split], &y[..split], config)?;
    let predicted: Vec<f64> = x[split..].iter().map(|row| forest.predict(row)).collect();
    let mut feature_importances: Vec<(String, f64)> = FEATURE_NAMES
        .iter()
        .map(|n| n.to_string())
        .zip(forest.feature_importances())
        .collect();
    feature_importances.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    let evaluation = ModelEvaluation {
        target,
        train_rows: split,
        test_rows: x.len() - split,
        metrics: regression_metrics(&y[split..], &predicted),
        feature_importances,
    };
    Ok((forest, evaluation))
}

fn push_lag(lags: &mut [f64; LAGS], value: f64) {
    lags.rotate_right(1);
    lags[0] = value;
}

/// Fit revenue and order forests on the chronological training split and
/// predict the next `config.horizon` months recursively
pub fn forecast_demand(orders: &[OrderFeatures], config: &ForecastConfig) -> DataResult<ForecastReport> {
    let history = monthly_series(orders);
    let set = training_set(&history);
    if set.x.len() < MIN_TRAINING_ROWS {
        return Err(DataError::InsufficientData(format!(
            "forecasting needs at least {} months with three months of history, found {}",
            MIN_TRAINING_ROWS,
            set.x.len()
        )));
    }

    let n = set.x.len();
    // Training rows are truncated, never rounded up
    let split = ((n as f64 * config.train_fraction).floor() as usize).clamp(1, n - 1);
    let (revenue_forest, revenue_model) =
        fit_and_score("revenue", &set.x, &set.revenue, split, &config.forest)?;
    let (orders_forest, orders_model) =
        fit_and_score("orders", &set.x, &set.orders, split, &config.forest)?;
    tracing::info!(
        rows = n,
        train = split,
        "forecast models fitted"
    );

    let last_idx = history.len() - 1;
    let mut revenue_lags = lags_before(&history, last_idx + 1, |p| p.revenue);
    let mut order_lags = lags_before(&history, last_idx + 1, |p| p.orders);
    let (mut year, mut month) = (history[last_idx].year, history[last_idx].month);

    let mut forecast = Vec::with_capacity(config.horizon);
    for _ in 0..config.horizon {
        (year, month) = next_month(year, month);
        let row = feature_row(month, &revenue_lags, &order_lags);
        let revenue = revenue_forest.predict_with_spread(&row);
        let orders = orders_forest.predict_with_spread(&row);
        forecast.push(ForecastPoint {
            year,
            month,
            month_name: month_name(month),
            revenue: revenue.mean,
            revenue_lower: revenue.mean - Z_95 * revenue.std,
            revenue_upper: revenue.mean + Z_95 * revenue.std,
            orders: orders.mean,
            orders_lower: (orders.mean - Z_95 * orders.std).max(0.0),
            orders_upper: orders.mean + Z_95 * orders.std,
        });
        push_lag(&mut revenue_lags, revenue.mean);
        push_lag(&mut order_lags, orders.mean);
    }

    Ok(ForecastReport {
        history,
        training_rows: n,
        revenue_model,
        orders_model,
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_wraps_year() {
        assert_eq!(next_month(2017, 12), (2018, 1));
        assert_eq!(next_month(2017, 3), (2017, 4));
    }

    #[test]
    fn test_push_lag_keeps_most_recent_first() {
        let mut lags = [3.0, 2.0, 1.0];
        push_lag(&mut lags, 4.0);
        assert_eq!(lags, [4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_feature_row_layout() {
        let row = feature_row(11, &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_eq!(row.len(), FEATURE_NAMES.len());
        assert_eq!(row[0], 11.0);
        assert_eq!(row[1], 4.0);
        assert_eq!(row[4], 4.0);
        assert_eq!(&row[5..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
