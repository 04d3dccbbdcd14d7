//! Missing value analysis

use anyhow::Result;
use polars::prelude::*;

/// Ratio of null cells per column, sorted descending.
///
/// Empty strings count as missing for string columns, matching how the CSV
/// export encodes absent values.
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = Vec::new();

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let missing = if series.dtype() == &DataType::String {
            series
                .str()?
                .iter()
                .filter(|v| v.map_or(true, |s| s.trim().is_empty()))
                .count()
        } else {
            series.null_count()
        };
        missing_ratios.push((column.name().to_string(), missing as f64 / rows));
    }

    // Sort by missing ratio descending
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}
