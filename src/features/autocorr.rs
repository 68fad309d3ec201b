//! # Autocorrelation descriptors
//!
//! $$
//! \rho_k = \frac{\sum_{t} (x_t-\bar x)(x_{t+k}-\bar x)}{\sum_t (x_t-\bar x)^2}
//! $$
//!
//! Linear autocorrelation structure plus two nonlinear serial-dependence
//! statistics (time-reversal asymmetry and binned auto-mutual information).

/// Number of equal-width bins used by [`auto_mutual_information_lag1`].
const AMI_BINS: usize = 5;

/// Autocorrelation at `lag` with the standard biased normalization.
pub fn autocorrelation(x: &[f64], lag: usize) -> f64 {
  let n = x.len();
  if lag >= n {
    return f64::NAN;
  }
  let mean = x.iter().sum::<f64>() / n as f64;
  let c0: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
  if c0 == 0.0 {
    return f64::NAN;
  }
  let ck: f64 = (0..n - lag)
    .map(|t| (x[t] - mean) * (x[t + lag] - mean))
    .sum();
  ck / c0
}

/// ACF evaluated at lags `1..=max_lag`.
pub fn acf_up_to(x: &[f64], max_lag: usize) -> Vec<f64> {
  (1..=max_lag).map(|k| autocorrelation(x, k)).collect()
}

fn acf_search_bound(n: usize) -> usize {
  (n / 2).min(100).max(1)
}

/// First lag at which the ACF drops to zero or below; the search bound
/// plus one when no crossing occurs within it.
pub fn first_zero_crossing(x: &[f64]) -> f64 {
  let bound = acf_search_bound(x.len());
  for k in 1..=bound {
    if autocorrelation(x, k) <= 0.0 {
      return k as f64;
    }
  }
  (bound + 1) as f64
}

/// First lag at which the ACF falls below `1/e`; the search bound plus one
/// when it never does.
pub fn first_below_inv_e(x: &[f64]) -> f64 {
  let threshold = (-1.0f64).exp();
  let bound = acf_search_bound(x.len());
  for k in 1..=bound {
    if autocorrelation(x, k) < threshold {
      return k as f64;
    }
  }
  (bound + 1) as f64
}

/// Sum of squared ACF values over lags 1..=10, a Box-Pierce-style measure
/// of total short-range linear memory.
pub fn sum_sq_acf10(x: &[f64]) -> f64 {
  acf_up_to(x, 10).iter().map(|r| r * r).sum()
}

/// Time-reversal asymmetry `mean((x_{t+1} - x_t)^3)`; zero in expectation
/// for time-reversible series.
pub fn time_reversal_asymmetry(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let n = (x.len() - 1) as f64;
  x.windows(2).map(|w| (w[1] - w[0]).powi(3)).sum::<f64>() / n
}

/// Auto-mutual information at lag 1 estimated from a 5x5 equal-width
/// histogram of `(x_t, x_{t+1})` pairs, in nats.
pub fn auto_mutual_information_lag1(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let min = x.iter().copied().fold(f64::INFINITY, f64::min);
  let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let width = max - min;
  if width <= 0.0 {
    return f64::NAN;
  }

  let bin_of = |v: f64| -> usize {
    let b = ((v - min) / width * AMI_BINS as f64) as usize;
    b.min(AMI_BINS - 1)
  };

  let pairs = x.len() - 1;
  let mut joint = [[0usize; AMI_BINS]; AMI_BINS];
  for w in x.windows(2) {
    joint[bin_of(w[0])][bin_of(w[1])] += 1;
  }

  let mut row = [0usize; AMI_BINS];
  let mut col = [0usize; AMI_BINS];
  for i in 0..AMI_BINS {
    for j in 0..AMI_BINS {
      row[i] += joint[i][j];
      col[j] += joint[i][j];
    }
  }

  let total = pairs as f64;
  let mut mi = 0.0;
  for i in 0..AMI_BINS {
    for j in 0..AMI_BINS {
      if joint[i][j] == 0 {
        continue;
      }
      let p_ij = joint[i][j] as f64 / total;
      let p_i = row[i] as f64 / total;
      let p_j = col[j] as f64 / total;
      mi += p_ij * (p_ij / (p_i * p_j)).ln();
    }
  }
  mi
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn alternating_series_has_strong_negative_acf1() {
    let x: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    assert!(autocorrelation(&x, 1) < -0.9);
    assert_abs_diff_eq!(first_zero_crossing(&x), 1.0, epsilon = 0.0);
  }

  #[test]
  fn slow_ramp_keeps_acf_positive_for_many_lags() {
    let x: Vec<f64> = (0..200).map(|i| i as f64).collect();
    assert!(autocorrelation(&x, 1) > 0.9);
    assert!(first_zero_crossing(&x) > 10.0);
  }

  #[test]
  fn monotone_increase_has_positive_reversal_asymmetry() {
    let x: Vec<f64> = (0..50).map(|i| (i as f64).powi(2)).collect();
    assert!(time_reversal_asymmetry(&x) > 0.0);
  }

  #[test]
  fn mutual_information_is_higher_for_dependent_series() {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    let dependent: Vec<f64> = (0..400).map(|i| (i as f64 * 0.05).sin()).collect();
    let mut rng = StdRng::seed_from_u64(7);
    let noise: Vec<f64> = (0..400).map(|_| rng.gen_range(-1.0..1.0)).collect();

    assert!(auto_mutual_information_lag1(&dependent) > 0.5);
    assert!(auto_mutual_information_lag1(&noise) < 0.2);
  }
}
