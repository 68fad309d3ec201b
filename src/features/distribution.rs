//! Distributional-shape descriptors: moments, quantiles and tail
//! asymmetry of the value distribution, ignoring temporal order.

/// Empirical quantile with linear interpolation; `sorted` must be
/// ascending and non-empty.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
  let n = sorted.len();
  if n == 1 {
    return sorted[0];
  }
  let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;
  sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn central_moment(x: &[f64], mean: f64, order: i32) -> f64 {
  x.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / x.len() as f64
}

/// Moment-based sample skewness `m3 / m2^(3/2)`.
pub fn skewness(x: &[f64]) -> f64 {
  let mean = x.iter().sum::<f64>() / x.len() as f64;
  let m2 = central_moment(x, mean, 2);
  let m3 = central_moment(x, mean, 3);
  m3 / m2.powf(1.5)
}

/// Excess kurtosis `m4 / m2^2 - 3`.
pub fn excess_kurtosis(x: &[f64]) -> f64 {
  let mean = x.iter().sum::<f64>() / x.len() as f64;
  let m2 = central_moment(x, mean, 2);
  let m4 = central_moment(x, mean, 4);
  m4 / (m2 * m2) - 3.0
}

pub fn median(x: &[f64]) -> f64 {
  let mut sorted = x.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));
  quantile(&sorted, 0.5)
}

/// Interquartile range `q75 - q25`.
pub fn interquartile_range(x: &[f64]) -> f64 {
  let mut sorted = x.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));
  quantile(&sorted, 0.75) - quantile(&sorted, 0.25)
}

/// Tail asymmetry `q90 + q10 - 2 * median`: positive when the upper tail
/// stretches further than the lower one.
pub fn tail_asymmetry(x: &[f64]) -> f64 {
  let mut sorted = x.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));
  quantile(&sorted, 0.90) + quantile(&sorted, 0.10) - 2.0 * quantile(&sorted, 0.5)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn median_and_iqr_on_known_values() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_abs_diff_eq!(median(&x), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(interquartile_range(&x), 2.0, epsilon = 1e-12);
  }

  #[test]
  fn skewness_of_symmetric_data_is_zero() {
    let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
    assert_abs_diff_eq!(skewness(&x), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(tail_asymmetry(&x), 0.0, epsilon = 1e-12);
  }

  #[test]
  fn right_skewed_data_has_positive_skewness() {
    let x = [0.0, 0.0, 0.0, 0.0, 10.0];
    assert!(skewness(&x) > 1.0);
  }
}
