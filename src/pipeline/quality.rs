//! Data quality checks on the raw tables
//!
//! Reports missing values, orphaned foreign keys, business rule violations
//! and out-of-range values. Nothing here changes the data.

use std::collections::HashSet;

use serde::Serialize;

use super::loader::{DataCatalog, DatasetKind};
use super::missing::analyze_missing_values;
use super::records::{float_column, string_column, Order};

#[derive(Debug, Clone, Serialize)]
pub struct MissingColumn {
    pub dataset: String,
    pub column: String,
    pub missing_pct: f64,
}

/// Child rows whose key has no parent row
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityCheck {
    pub relationship: String,
    pub child_rows: usize,
    pub orphaned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleViolation {
    pub rule: String,
    pub dataset: String,
    pub checked: usize,
    pub violations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeCheck {
    pub dataset: String,
    pub column: String,
    pub min_allowed: f64,
    pub max_allowed: f64,
    pub checked: usize,
    pub out_of_range: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub missing: Vec<MissingColumn>,
    pub integrity: Vec<IntegrityCheck>,
    pub rules: Vec<RuleViolation>,
    pub ranges: Vec<RangeCheck>,
    /// Checks that could not run because a table failed to load
    pub skipped: Vec<String>,
}

impl QualityReport {
    pub fn issue_count(&self) -> usize {
        self.integrity.iter().filter(|c| c.orphaned > 0).count()
            + self.rules.iter().filter(|r| r.violations > 0).count()
            + self.ranges.iter().filter(|r| r.out_of_range > 0).count()
    }
}

/// Count child keys absent from the parent key set
pub fn orphan_count<'a>(
    parent_keys: impl IntoIterator<Item = &'a str>,
    child_keys: impl IntoIterator<Item = &'a str>,
) -> usize {
    let parents: HashSet<&str> = parent_keys.into_iter().collect();
    child_keys
        .into_iter()
        .filter(|key| !parents.contains(key))
        .count()
}

/// (dataset, column, min, max)
const RANGE_RULES: [(DatasetKind, &str, f64, f64); 8] = [
    (DatasetKind::Products, "product_weight_g", 0.0, 50_000.0),
    (DatasetKind::Products, "product_length_cm", 0.0, 200.0),
    (DatasetKind::Products, "product_height_cm", 0.0, 200.0),
    (DatasetKind::Products, "product_width_cm", 0.0, 200.0),
    (DatasetKind::OrderPayments, "payment_value", 0.0, 10_000.0),
    (DatasetKind::OrderPayments, "payment_installments", 1.0, 24.0),
    (DatasetKind::OrderReviews, "review_score", 1.0, 5.0),
    (DatasetKind::OrderItems, "price", 0.0, 10_000.0),
];

const DIMENSION_COLUMNS: [&str; 4] = [
    "product_weight_g",
    "product_length_cm",
    "product_height_cm",
    "product_width_cm",
];

fn key_set(catalog: &DataCatalog, kind: DatasetKind, column: &str) -> Option<Vec<String>> {
    let df = catalog.get(kind).ok()?;
    string_column(df, kind, column)
        .ok()
        .map(|v| v.into_iter().flatten().collect())
}

/// Run every check the loaded tables allow
pub fn assess_quality(catalog: &DataCatalog) -> QualityReport {
    let mut report = QualityReport::default();

    for (kind, df) in catalog.loaded() {
        if let Ok(ratios) = analyze_missing_values(df) {
            report.missing.extend(
                ratios
                    .into_iter()
                    .filter(|(_, ratio)| *ratio > 0.0)
                    .map(|(column, ratio)| MissingColumn {
                        dataset: kind.name().to_string(),
                        column,
                        missing_pct: ratio * 100.0,
                    }),
            );
        }
    }

    let relationships = [
        (DatasetKind::Customers, "customer_id", DatasetKind::Orders, "customer_id"),
        (DatasetKind::Orders, "order_id", DatasetKind::OrderItems, "order_id"),
        (DatasetKind::Orders, "order_id", DatasetKind::OrderPayments, "order_id"),
        (DatasetKind::Orders, "order_id", DatasetKind::OrderReviews, "order_id"),
        (DatasetKind::Products, "product_id", DatasetKind::OrderItems, "product_id"),
        (DatasetKind::Sellers, "seller_id", DatasetKind::OrderItems, "seller_id"),
    ];
    for (parent, parent_key, child, child_key) in relationships {
        let name = format!("{} -> {}", parent, child);
        match (
            key_set(catalog, parent, parent_key),
            key_set(catalog, child, child_key),
        ) {
            (Some(parents), Some(children)) => report.integrity.push(IntegrityCheck {
                relationship: name,
                child_rows: children.len(),
                orphaned: orphan_count(
                    parents.iter().map(String::as_str),
                    children.iter().map(String::as_str),
                ),
            }),
            _ => report.skipped.push(format!("referential integrity {}", name)),
        }
    }

    match catalog.get(DatasetKind::Orders).and_then(Order::from_frame) {
        Ok(orders) => {
            let mut checked = 0;
            let mut violations = 0;
            let mut delivery_days = Vec::new();
            for order in &orders {
                if let (Some(p), Some(d)) = (order.purchased_at, order.delivered_customer_at) {
                    checked += 1;
                    if d < p {
                        violations += 1;
                    }
                    delivery_days.push((d - p).num_seconds().div_euclid(86_400) as f64);
                }
            }
            report.rules.push(RuleViolation {
                rule: "delivered on or after purchase".to_string(),
                dataset: DatasetKind::Orders.name().to_string(),
                checked,
                violations,
            });
            report
                .ranges
                .push(range_check(DatasetKind::Orders, "delivery_days", 0.0, 365.0, &delivery_days));
        }
        Err(_) => report.skipped.push("order timestamp rules".to_string()),
    }

    if let Ok(df) = catalog.get(DatasetKind::Products) {
        for column in DIMENSION_COLUMNS {
            if let Ok(values) = float_column(df, DatasetKind::Products, column) {
                let present: Vec<f64> = values.into_iter().flatten().collect();
                report.rules.push(RuleViolation {
                    rule: format!("{} positive", column),
                    dataset: DatasetKind::Products.name().to_string(),
                    checked: present.len(),
                    violations: present.iter().filter(|v| **v <= 0.0).count(),
                });
            }
        }
    } else {
        report.skipped.push("product dimension rules".to_string());
    }

    if let Ok(df) = catalog.get(DatasetKind::OrderPayments) {
        if let Ok(values) = float_column(df, DatasetKind::OrderPayments, "payment_value") {
            let present: Vec<f64> = values.into_iter().flatten().collect();
            report.rules.push(RuleViolation {
                rule: "payment_value positive".to_string(),
                dataset: DatasetKind::OrderPayments.name().to_string(),
                checked: present.len(),
                violations: present.iter().filter(|v| **v <= 0.0).count(),
            });
        }
    } else {
        report.skipped.push("payment value rules".to_string());
    }

    for (kind, column, min, max) in RANGE_RULES {
        let values = catalog
            .get(kind)
            .ok()
            .and_then(|df| float_column(df, kind, column).ok());
        match values {
            Some(values) => {
                let present: Vec<f64> = values.into_iter().flatten().collect();
                report.ranges.push(range_check(kind, column, min, max, &present));
            }
            None => report.skipped.push(format!("range {}.{}", kind, column)),
        }
    }

    report
}

fn range_check(kind: DatasetKind, column: &str, min: f64, max: f64, values: &[f64]) -> RangeCheck {
    RangeCheck {
        dataset: kind.name().to_string(),
        column: column.to_string(),
        min_allowed: min,
        max_allowed: max,
        checked: values.len(),
        out_of_range: values.iter().filter(|v| **v < min || **v > max).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphan_count() {
        let parents = ["a", "b", "c"];
        let children = ["a", "a", "d", "e", "c"];
        assert_eq!(orphan_count(parents, children), 2);
    }

    #[test]
    fn test_range_check_bounds_are_inclusive() {
        let check = range_check(DatasetKind::OrderReviews, "review_score", 1.0, 5.0, &[1.0, 5.0, 0.0, 6.0]);
        assert_eq!(check.checked, 4);
        assert_eq!(check.out_of_range, 2);
    }
}
