//! Pearson correlation over numeric columns

use faer::Mat;
use rayon::prelude::*;
use serde::Serialize;

/// Represents a correlated pair of variables
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedPair {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

/// Square correlation matrix; `None` where a column is constant
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    pub rows: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.values[i][j]
    }

    /// Off-diagonal pairs with |r| above `threshold`, strongest first
    pub fn pairs_above(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let n = self.names.len();
        let mut pairs = Vec::new();

        // Extract upper triangle
        for i in 0..n {
            for j in (i + 1)..n {
                if let Some(corr) = self.values[i][j] {
                    if corr.abs() > threshold {
                        pairs.push(CorrelatedPair {
                            feature1: self.names[i].clone(),
                            feature2: self.names[j].clone(),
                            correlation: corr,
                        });
                    }
                }
            }
        }

        pairs.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

/// Correlation matrix of equally long columns.
///
/// Columns are standardised and scaled by 1/sqrt(n) so that R = Zᵀ·Z.
/// Returns None with fewer than two columns or two rows.
pub fn correlation_matrix(columns: &[(String, Vec<f64>)]) -> Option<CorrelationMatrix> {
    let n_cols = columns.len();
    if n_cols < 2 {
        return None;
    }
    let n_rows = columns[0].1.len();
    if n_rows < 2 || columns.iter().any(|(_, c)| c.len() != n_rows) {
        return None;
    }
    let scale = (n_rows as f64).sqrt();

    let standardized: Vec<Option<Vec<f64>>> = columns
        .par_iter()
        .map(|(_, values)| {
            let mean = values.iter().sum::<f64>() / n_rows as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
            let std = var.sqrt();
            if std == 0.0 {
                return None; // Constant column
            }
            Some(values.iter().map(|v| (v - mean) / std / scale).collect())
        })
        .collect();

    let valid: Vec<(usize, &Vec<f64>)> = standardized
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_ref().map(|v| (i, v)))
        .collect();

    let mut z = Mat::<f64>::zeros(n_rows, valid.len());
    for (col_idx, (_, col_data)) in valid.iter().enumerate() {
        for (row_idx, &val) in col_data.iter().enumerate() {
            z[(row_idx, col_idx)] = val;
        }
    }
    let product = z.transpose() * &z;

    let mut values = vec![vec![None; n_cols]; n_cols];
    for (a, (i, _)) in valid.iter().enumerate() {
        for (b, (j, _)) in valid.iter().enumerate() {
            values[*i][*j] = Some(if i == j {
                1.0
            } else {
                product[(a, b)].clamp(-1.0, 1.0)
            });
        }
    }

    Some(CorrelationMatrix {
        names: columns.iter().map(|(n, _)| n.clone()).collect(),
        values,
        rows: n_rows,
    })
}
