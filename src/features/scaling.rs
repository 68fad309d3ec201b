//! # Fluctuation-scaling descriptors
//!
//! $$
//! F(s) \sim s^{\alpha}, \qquad \mathbb E[R/S]_s \sim s^{H}
//! $$
//!
//! Self-similarity estimates over dyadic scales: detrended fluctuation
//! exponent, rescaled-range Hurst estimate, variance ratio, and the
//! Higuchi fractal dimension of the path.
//!
//! Unlike the validated estimator entry points elsewhere, these are feature
//! primitives: invalid inputs yield `NaN`, which the extractor maps to an
//! exclusion rather than a panic.

use linreg::linear_regression;

fn dyadic_scales(min: usize, max: usize) -> Vec<usize> {
  let mut scales = Vec::new();
  let mut s = min;
  while s <= max {
    scales.push(s);
    s *= 2;
  }
  scales
}

fn ols_slope(xs: &[f64], ys: &[f64]) -> f64 {
  linear_regression::<f64, f64, f64>(xs, ys)
    .map(|(slope, _)| slope)
    .unwrap_or(f64::NAN)
}

/// Detrended fluctuation exponent: slope of `log F(s)` against `log s`
/// over dyadic scales `4..=n/4`, where `F(s)` is the RMS deviation of the
/// integrated profile from per-segment linear trends.
pub fn dfa_exponent(x: &[f64]) -> f64 {
  let n = x.len();
  if n < 16 {
    return f64::NAN;
  }
  let mean = x.iter().sum::<f64>() / n as f64;
  let mut profile = Vec::with_capacity(n);
  let mut acc = 0.0;
  for v in x {
    acc += v - mean;
    profile.push(acc);
  }

  let scales = dyadic_scales(4, n / 4);
  if scales.len() < 2 {
    return f64::NAN;
  }

  let mut log_s = Vec::with_capacity(scales.len());
  let mut log_f = Vec::with_capacity(scales.len());
  for &s in &scales {
    let n_seg = n / s;
    let mut sq_sum = 0.0;
    let ts: Vec<f64> = (0..s).map(|t| t as f64).collect();
    for seg in 0..n_seg {
      let y = &profile[seg * s..(seg + 1) * s];
      let (slope, intercept) = match linear_regression::<f64, f64, f64>(&ts, y) {
        Ok(fit) => fit,
        Err(_) => return f64::NAN,
      };
      let residual_sq: f64 = y
        .iter()
        .enumerate()
        .map(|(t, v)| (v - (slope * t as f64 + intercept)).powi(2))
        .sum();
      sq_sum += residual_sq / s as f64;
    }
    let f_s = (sq_sum / n_seg as f64).sqrt();
    if f_s <= 0.0 || !f_s.is_finite() {
      return f64::NAN;
    }
    log_s.push((s as f64).ln());
    log_f.push(f_s.ln());
  }
  ols_slope(&log_s, &log_f)
}

/// Rescaled-range Hurst estimate: slope of `log E[R/S]` against
/// `log s` over dyadic segment lengths `8..=n/2`.
pub fn hurst_rescaled_range(x: &[f64]) -> f64 {
  let n = x.len();
  if n < 32 {
    return f64::NAN;
  }

  let scales = dyadic_scales(8, n / 2);
  if scales.len() < 2 {
    return f64::NAN;
  }

  let mut log_s = Vec::with_capacity(scales.len());
  let mut log_rs = Vec::with_capacity(scales.len());
  for &s in &scales {
    let n_seg = n / s;
    let mut rs_sum = 0.0;
    let mut rs_count = 0usize;
    for seg in 0..n_seg {
      let y = &x[seg * s..(seg + 1) * s];
      let seg_mean = y.iter().sum::<f64>() / s as f64;
      let seg_sd =
        (y.iter().map(|v| (v - seg_mean).powi(2)).sum::<f64>() / s as f64).sqrt();
      if seg_sd == 0.0 {
        continue;
      }
      let mut acc = 0.0;
      let mut lo = f64::INFINITY;
      let mut hi = f64::NEG_INFINITY;
      for v in y {
        acc += v - seg_mean;
        lo = lo.min(acc);
        hi = hi.max(acc);
      }
      rs_sum += (hi - lo) / seg_sd;
      rs_count += 1;
    }
    if rs_count == 0 {
      continue;
    }
    let avg = rs_sum / rs_count as f64;
    if avg <= 0.0 || !avg.is_finite() {
      continue;
    }
    log_s.push((s as f64).ln());
    log_rs.push(avg.ln());
  }
  if log_s.len() < 2 {
    return f64::NAN;
  }
  ols_slope(&log_s, &log_rs)
}

/// Variance ratio at aggregation `q`: `Var(x_{t+q} - x_t) / (q * Var(x_{t+1} - x_t))`.
/// Near 1 for a random walk, below 1 for mean-reverting paths.
pub fn variance_ratio(x: &[f64], q: usize) -> f64 {
  let n = x.len();
  if q < 2 || n < q + 2 {
    return f64::NAN;
  }
  let sample_var = |d: &[f64]| -> f64 {
    let m = d.iter().sum::<f64>() / d.len() as f64;
    d.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (d.len() as f64 - 1.0)
  };
  let d1: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
  let dq: Vec<f64> = (0..n - q).map(|t| x[t + q] - x[t]).collect();
  let v1 = sample_var(&d1);
  if v1 == 0.0 {
    return f64::NAN;
  }
  sample_var(&dq) / (q as f64 * v1)
}

/// Higuchi fractal dimension of the path, estimated over curve lengths at
/// strides `1..=kmax`. Between 1 (smooth) and 2 (space-filling).
pub fn higuchi_fd(x: &[f64], kmax: usize) -> f64 {
  let n = x.len();
  if n < 3 || kmax < 2 {
    return f64::NAN;
  }

  let k_upper = kmax.min(n - 1);
  let mut log_inv_k = Vec::with_capacity(k_upper);
  let mut log_len = Vec::with_capacity(k_upper);

  for k in 1..=k_upper {
    let mut lm_sum = 0.0;
    let mut lm_count = 0usize;

    for m in 0..k {
      let n_max = (n - m - 1) / k;
      if n_max == 0 {
        continue;
      }
      let mut ll = 0.0;
      for j in 1..=n_max {
        ll += (x[m + j * k] - x[m + (j - 1) * k]).abs();
      }
      ll /= k as f64;
      ll *= (n - 1) as f64 / (k * n_max) as f64;
      if ll.is_finite() && ll > 0.0 {
        lm_sum += ll;
        lm_count += 1;
      }
    }

    if lm_count > 0 {
      let lk = lm_sum / lm_count as f64;
      if lk.is_finite() && lk > 0.0 {
        log_inv_k.push((1.0 / k as f64).ln());
        log_len.push(lk.ln());
      }
    }
  }

  if log_inv_k.len() < 2 {
    return f64::NAN;
  }
  ols_slope(&log_inv_k, &log_len)
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn white_noise(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
  }

  #[test]
  fn dfa_of_white_noise_is_near_one_half() {
    let x = white_noise(2048, 11);
    let alpha = dfa_exponent(&x);
    assert!((alpha - 0.5).abs() < 0.15, "alpha = {alpha}");
  }

  #[test]
  fn dfa_of_a_random_walk_is_near_three_halves() {
    let noise = white_noise(2048, 12);
    let mut walk = Vec::with_capacity(noise.len());
    let mut acc = 0.0;
    for v in &noise {
      acc += v;
      walk.push(acc);
    }
    let alpha = dfa_exponent(&walk);
    assert!((alpha - 1.5).abs() < 0.25, "alpha = {alpha}");
  }

  #[test]
  fn hurst_of_white_noise_is_near_one_half() {
    let x = white_noise(2048, 13);
    let h = hurst_rescaled_range(&x);
    assert!((h - 0.5).abs() < 0.2, "h = {h}");
  }

  #[test]
  fn variance_ratio_of_alternation_is_far_below_one() {
    let x: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let vr = variance_ratio(&x, 5);
    assert!(vr < 0.5, "vr = {vr}");
  }

  #[test]
  fn higuchi_separates_smooth_from_noisy_paths() {
    let ramp: Vec<f64> = (0..512).map(|i| i as f64 / 512.0).collect();
    let noise = white_noise(512, 14);
    let fd_ramp = higuchi_fd(&ramp, 10);
    let fd_noise = higuchi_fd(&noise, 10);
    assert!(fd_ramp < 1.2, "fd_ramp = {fd_ramp}");
    assert!(fd_noise > 1.7, "fd_noise = {fd_noise}");
  }
}
