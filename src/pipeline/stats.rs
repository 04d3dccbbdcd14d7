//! Small descriptive statistics shared by the analyses

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator); `None` below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_copy(values);
    if sorted.is_empty() {
        return None;
    }
    Some(linear_quantile(&sorted, 0.5))
}

/// Sort a copy of the finite values in ascending order
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Quantile of pre-sorted data with linear interpolation between ranks.
///
/// `sorted` must be non-empty and ascending; `q` is clamped to [0, 1].
pub fn linear_quantile(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Coefficient of variation using the sample standard deviation; 0 when the mean is 0
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    match (mean(values), sample_std(values)) {
        (Some(m), Some(sd)) if m != 0.0 => sd / m,
        _ => 0.0,
    }
}

/// Percentage change of `value` relative to `baseline`; 0 when the baseline is 0
pub fn pct_delta(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        (value / baseline - 1.0) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(linear_quantile(&sorted, 0.0), 1.0);
        assert_eq!(linear_quantile(&sorted, 1.0), 4.0);
        assert!((linear_quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let sd = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138089935).abs() < 1e-6, "got {}", sd);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn test_cv_zero_mean() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
