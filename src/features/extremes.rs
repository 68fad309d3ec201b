//! Outlier, excursion and successive-difference descriptors.

use ndarray::ArrayView1;
use ndarray_stats::QuantileExt;

/// Mean absolute one-step change.
pub fn mean_abs_change(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let n = (x.len() - 1) as f64;
  x.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / n
}

/// Fraction of consecutive pairs that straddle the series mean.
pub fn mean_crossing_rate(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let mean = x.iter().sum::<f64>() / x.len() as f64;
  let crossings = x
    .windows(2)
    .filter(|w| (w[0] - mean) * (w[1] - mean) < 0.0)
    .count();
  crossings as f64 / (x.len() - 1) as f64
}

/// Fraction of values more than two standard deviations from the mean.
pub fn outlier_fraction_2sigma(x: &[f64]) -> f64 {
  let n = x.len() as f64;
  let mean = x.iter().sum::<f64>() / n;
  let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
  let sd = var.sqrt();
  if sd == 0.0 {
    return f64::NAN;
  }
  x.iter().filter(|v| (*v - mean).abs() > 2.0 * sd).count() as f64 / n
}

/// Length of the longest run of values strictly above the mean.
pub fn longest_run_above_mean(x: &[f64]) -> f64 {
  let mean = x.iter().sum::<f64>() / x.len() as f64;
  let mut best = 0usize;
  let mut run = 0usize;
  for v in x {
    if *v > mean {
      run += 1;
      best = best.max(run);
    } else {
      run = 0;
    }
  }
  best as f64
}

/// Total value range `max - min`.
pub fn value_range(x: &[f64]) -> f64 {
  let view = ArrayView1::from(x);
  match (view.min(), view.max()) {
    (Ok(min), Ok(max)) => max - min,
    _ => f64::NAN,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn runs_and_range_on_a_step_series() {
    let x = [0.0, 0.0, 0.0, 4.0, 4.0, 4.0, 4.0, 0.0];
    assert_abs_diff_eq!(longest_run_above_mean(&x), 4.0, epsilon = 0.0);
    assert_abs_diff_eq!(value_range(&x), 4.0, epsilon = 1e-12);
  }

  #[test]
  fn alternating_series_crosses_the_mean_every_step() {
    let x: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    assert_abs_diff_eq!(mean_crossing_rate(&x), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(mean_abs_change(&x), 2.0, epsilon = 1e-12);
  }

  #[test]
  fn outlier_fraction_flags_a_single_spike() {
    let mut x = vec![0.0; 99];
    x.push(50.0);
    let frac = outlier_fraction_2sigma(&x);
    assert_abs_diff_eq!(frac, 0.01, epsilon = 1e-12);
  }
}
