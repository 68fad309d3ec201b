//! # DTW mode
//!
//! $$
//! D_{i,j} = c_{i,j} + \min\{D_{i-1,j},\ D_{i,j-1},\ D_{i-1,j-1}\}
//! $$
//!
//! Dynamic-time-warping distances between standardized series, optionally
//! constrained to a Sakoe-Chiba band, plus a seeded k-medoid partition of
//! the resulting distance matrix. Unlike the feature-space modes, this
//! one compares the series shapes directly.

use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::error::AnalysisError;

/// DTW-mode parameters.
#[derive(Clone, Copy, Debug)]
pub struct DtwConfig {
  /// Number of medoids.
  pub k: usize,
  /// Sakoe-Chiba band half-width; `None` leaves the warp unconstrained.
  pub band: Option<usize>,
  /// Independent seeded restarts; the lowest-cost partition wins.
  pub restarts: usize,
  /// Cap on assign/update sweeps per restart.
  pub max_iter: usize,
  /// Base RNG seed; restart `r` uses `seed + r`.
  pub seed: u64,
}

impl Default for DtwConfig {
  fn default() -> Self {
    Self {
      k: 5,
      band: Some(10),
      restarts: 10,
      max_iter: 50,
      seed: 42,
    }
  }
}

/// Output of a DTW medoid fit.
#[derive(Clone, Debug)]
pub struct DtwMedoidFit {
  /// 0-based cluster index per input series.
  pub labels: Vec<usize>,
  /// Row index of each cluster's medoid.
  pub medoids: Vec<usize>,
  /// Total distance of every series to its medoid.
  pub cost: f64,
}

/// Dynamic-time-warping distance between two series, with squared local
/// cost and an optional Sakoe-Chiba band. The band is widened to the
/// length difference when necessary, so the warp always exists.
pub fn distance(a: &[f64], b: &[f64], band: Option<usize>) -> f64 {
  let n = a.len();
  let m = b.len();
  if n == 0 || m == 0 {
    return f64::NAN;
  }

  let width = band.map(|w| w.max(n.abs_diff(m)));
  let mut prev = vec![f64::INFINITY; m + 1];
  let mut cur = vec![f64::INFINITY; m + 1];
  prev[0] = 0.0;

  for i in 1..=n {
    cur.fill(f64::INFINITY);
    let (lo, hi) = match width {
      Some(w) => (i.saturating_sub(w).max(1), (i + w).min(m)),
      None => (1, m),
    };
    for j in lo..=hi {
      let cost = (a[i - 1] - b[j - 1]).powi(2);
      let best = prev[j].min(cur[j - 1]).min(prev[j - 1]);
      cur[j] = cost + best;
    }
    std::mem::swap(&mut prev, &mut cur);
  }
  prev[m].sqrt()
}

/// Full pairwise DTW distance matrix.
pub fn distance_matrix(series: &[&[f64]], band: Option<usize>) -> Array2<f64> {
  let n = series.len();
  let mut dist = Array2::zeros((n, n));
  for i in 0..n {
    for j in (i + 1)..n {
      let d = distance(series[i], series[j], band);
      dist[[i, j]] = d;
      dist[[j, i]] = d;
    }
  }
  dist
}

fn assign(dist: &Array2<f64>, medoids: &[usize]) -> (Vec<usize>, f64) {
  let n = dist.nrows();
  let mut labels = vec![0usize; n];
  let mut cost = 0.0;
  for i in 0..n {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for (c, &m) in medoids.iter().enumerate() {
      if dist[[i, m]] < best_d {
        best_d = dist[[i, m]];
        best = c;
      }
    }
    labels[i] = best;
    cost += best_d;
  }
  (labels, cost)
}

fn update_medoids(dist: &Array2<f64>, labels: &[usize], k: usize) -> Vec<usize> {
  let n = dist.nrows();
  let mut medoids = vec![usize::MAX; k];
  for c in 0..k {
    let members: Vec<usize> = (0..n).filter(|i| labels[*i] == c).collect();
    let best = members
      .iter()
      .min_by(|&&a, &&b| {
        let cost_a: f64 = members.iter().map(|&m| dist[[a, m]]).sum();
        let cost_b: f64 = members.iter().map(|&m| dist[[b, m]]).sum();
        cost_a.total_cmp(&cost_b)
      })
      .copied();
    if let Some(m) = best {
      medoids[c] = m;
    }
  }
  medoids
}

/// k-medoids over a precomputed distance matrix, seeded restarts keeping
/// the lowest total assignment cost.
pub fn fit_medoids(dist: &Array2<f64>, config: &DtwConfig) -> Result<DtwMedoidFit, AnalysisError> {
  let n = dist.nrows();
  if config.k == 0 || n < config.k {
    return Err(AnalysisError::InsufficientPopulation {
      rows: n,
      required: config.k.max(1),
    });
  }

  let restarts = config.restarts.max(1);
  let mut best: Option<DtwMedoidFit> = None;

  for r in 0..restarts {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(r as u64));
    let mut medoids: Vec<usize> = sample(&mut rng, n, config.k).into_vec();
    medoids.sort_unstable();

    let (mut labels, mut cost) = assign(dist, &medoids);
    for _ in 0..config.max_iter {
      let mut next = update_medoids(dist, &labels, config.k);
      // An emptied cluster keeps its previous medoid.
      for (c, m) in next.iter_mut().enumerate() {
        if *m == usize::MAX {
          *m = medoids[c];
        }
      }
      let (next_labels, next_cost) = assign(dist, &next);
      if next_cost >= cost - 1e-12 {
        break;
      }
      medoids = next;
      labels = next_labels;
      cost = next_cost;
    }

    let improved = best.as_ref().map_or(true, |b| cost < b.cost);
    if improved {
      best = Some(DtwMedoidFit {
        labels,
        medoids,
        cost,
      });
    }
  }

  Ok(best.expect("restarts >= 1"))
}
