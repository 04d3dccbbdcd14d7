//! Equal-frequency bucketing used for RFM and CLV scoring
//!
//! Edges are the linear-interpolation quantiles at `0, 1/k, ..., 1`.
//! Buckets are right-inclusive, `(e[i-1], e[i]]`, with the lowest bucket also
//! holding its lower edge. When several edges coincide a value equal to the
//! shared edge lands in the lowest bucket containing it, so skewed data can
//! produce unequal bucket sizes and a constant input puts everything in bucket 1.

use std::cmp::Ordering;

use super::stats::{linear_quantile, sorted_copy};

/// Quantile edges for `buckets` equal-frequency bins (`buckets + 1` values)
pub fn quantile_edges(values: &[f64], buckets: usize) -> Vec<f64> {
    let sorted = sorted_copy(values);
    if sorted.is_empty() || buckets == 0 {
        return Vec::new();
    }
    (0..=buckets)
        .map(|i| linear_quantile(&sorted, i as f64 / buckets as f64))
        .collect()
}

/// 1-based bucket of `value` given edges from [`quantile_edges`]
pub fn assign_bucket(value: f64, edges: &[f64]) -> u8 {
    let buckets = edges.len().saturating_sub(1);
    if buckets == 0 {
        return 1;
    }
    for (i, edge) in edges.iter().enumerate().skip(1) {
        if value <= *edge {
            return i as u8;
        }
    }
    buckets as u8
}

/// Bucket every value on its raw magnitude
pub fn quantile_scores(values: &[f64], buckets: usize) -> Vec<u8> {
    let edges = quantile_edges(values, buckets);
    values.iter().map(|v| assign_bucket(*v, &edges)).collect()
}

/// Bucket values by their ordinal rank (ties broken by position), so every
/// bucket receives an equal share regardless of duplicate values
pub fn rank_scores(values: &[f64], buckets: usize) -> Vec<u8> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }
    quantile_scores(&ranks, buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values_fill_quintiles_evenly() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let scores = quantile_scores(&values, 5);
        assert_eq!(scores, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_constant_values_go_to_lowest_bucket() {
        let scores = quantile_scores(&[1.0; 8], 5);
        assert!(scores.iter().all(|&s| s == 1));
    }

    #[test]
    fn test_ties_assigned_to_lower_bucket() {
        // 60% of the mass sits on the minimum, so edges 0.2..0.6 coincide
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let scores = quantile_scores(&values, 5);
        assert!(scores[..6].iter().all(|&s| s == 1), "got {:?}", scores);
        assert_eq!(*scores.last().unwrap(), 5);
    }

    #[test]
    fn test_rank_scores_split_ties_by_position() {
        let scores = rank_scores(&[7.0, 7.0, 7.0, 7.0], 4);
        assert_eq!(scores, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_assign_bucket_outside_edges() {
        let edges = quantile_edges(&[1.0, 2.0, 3.0, 4.0, 5.0], 5);
        assert_eq!(assign_bucket(-10.0, &edges), 1);
        assert_eq!(assign_bucket(100.0, &edges), 5);
    }
}
