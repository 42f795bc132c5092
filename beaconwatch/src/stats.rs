//! Small numeric kernels shared by feature extraction and Tier 1 rules.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divide by n, not n-1) — matches the
/// reference implementation's use of numpy's default `std`.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn intervals(sorted_timestamps: &[i64]) -> Vec<f64> {
    sorted_timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64)
        .collect()
}

/// Linear-interpolation percentile, matching numpy's default `percentile`.
pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    if sorted_values.len() == 1 {
        return sorted_values[0];
    }
    let rank = p / 100.0 * (sorted_values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_values[lo];
    }
    let frac = rank - lo as f64;
    sorted_values[lo] + (sorted_values[hi] - sorted_values[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_of_constant_series_is_zero_variance() {
        let v = vec![5.0, 5.0, 5.0];
        assert_eq!(mean(&v), 5.0);
        assert_eq!(population_std(&v), 0.0);
    }

    #[test]
    fn percentile_matches_known_quartiles() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&v, 25.0) - 1.75).abs() < 1e-9);
        assert!((percentile(&v, 75.0) - 3.25).abs() < 1e-9);
    }

    #[test]
    fn intervals_are_consecutive_diffs() {
        let ts = vec![0, 10, 25];
        assert_eq!(intervals(&ts), vec![10.0, 15.0]);
    }

    #[test]
    fn empty_input_returns_zero_not_nan() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
