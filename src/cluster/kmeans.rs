//! # Centroid mode
//!
//! $$
//! \min_{C_1..C_k} \sum_{j=1}^{k} \sum_{x \in C_j} \lVert x - \mu_j \rVert^2
//! $$
//!
//! Lloyd's algorithm with k-means++ seeding and multiple seeded restarts,
//! keeping the lowest total within-cluster sum of squares. Deterministic
//! under a fixed seed. The engine never auto-selects k: [`wss_scan`]
//! exposes the (k, WSS) curve and the caller picks the elbow.

use ndarray::Array2;
use ndarray::ArrayView1;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::AnalysisError;

/// Centroid-mode parameters.
#[derive(Clone, Copy, Debug)]
pub struct KMeansConfig {
  /// Number of clusters.
  pub k: usize,
  /// Independent seeded restarts; the lowest-WSS solution wins.
  pub restarts: usize,
  /// Iteration cap per restart.
  pub max_iter: usize,
  /// Centroid-shift convergence threshold.
  pub tolerance: f64,
  /// Base RNG seed; restart `r` uses `seed + r`.
  pub seed: u64,
}

impl Default for KMeansConfig {
  fn default() -> Self {
    Self {
      k: 5,
      restarts: 10,
      max_iter: 300,
      tolerance: 1e-8,
      seed: 42,
    }
  }
}

/// Output of one centroid fit.
#[derive(Clone, Debug)]
pub struct KMeansFit {
  /// 0-based cluster index per input row.
  pub labels: Vec<usize>,
  /// Final centroids, one row per cluster.
  pub centroids: Array2<f64>,
  /// Total within-cluster sum of squares.
  pub wss: f64,
  /// Lloyd iterations of the winning restart.
  pub iterations: usize,
}

fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
  a.iter()
    .zip(b.iter())
    .map(|(x, y)| (x - y) * (x - y))
    .sum()
}

/// k-means++ seeding: first centroid uniform, the rest D^2-weighted.
fn seed_centroids(matrix: &Array2<f64>, k: usize, rng: &mut StdRng) -> Vec<usize> {
  let n = matrix.nrows();
  let mut chosen = Vec::with_capacity(k);
  chosen.push(rng.gen_range(0..n));

  let mut best_sq = vec![f64::INFINITY; n];
  while chosen.len() < k {
    let last = *chosen.last().expect("at least one centroid chosen");
    for i in 0..n {
      let d = sq_dist(matrix.row(i), matrix.row(last));
      if d < best_sq[i] {
        best_sq[i] = d;
      }
    }
    let total: f64 = best_sq.iter().sum();
    let next = if total > 0.0 {
      let mut target = rng.gen::<f64>() * total;
      let mut pick = n - 1;
      for (i, d) in best_sq.iter().enumerate() {
        target -= d;
        if target <= 0.0 {
          pick = i;
          break;
        }
      }
      pick
    } else {
      // All remaining points coincide with a centroid.
      rng.gen_range(0..n)
    };
    chosen.push(next);
  }
  chosen
}

fn lloyd(matrix: &Array2<f64>, config: &KMeansConfig, rng: &mut StdRng) -> KMeansFit {
  let n = matrix.nrows();
  let d = matrix.ncols();
  let k = config.k;

  let seeds = seed_centroids(matrix, k, rng);
  let mut centroids = Array2::zeros((k, d));
  for (j, &row) in seeds.iter().enumerate() {
    centroids.row_mut(j).assign(&matrix.row(row));
  }

  let mut labels = vec![0usize; n];
  let mut iterations = 0usize;

  for iter in 0..config.max_iter {
    iterations = iter + 1;

    // Assignment step; ties go to the lowest cluster index.
    for i in 0..n {
      let mut best = 0usize;
      let mut best_d = f64::INFINITY;
      for j in 0..k {
        let dist = sq_dist(matrix.row(i), centroids.row(j));
        if dist < best_d {
          best_d = dist;
          best = j;
        }
      }
      labels[i] = best;
    }

    // Update step.
    let mut sums = Array2::<f64>::zeros((k, d));
    let mut counts = vec![0usize; k];
    for i in 0..n {
      let j = labels[i];
      counts[j] += 1;
      for c in 0..d {
        sums[[j, c]] += matrix[[i, c]];
      }
    }

    // Re-seed empty clusters with the point farthest from its centroid.
    for j in 0..k {
      if counts[j] > 0 {
        continue;
      }
      let far = (0..n)
        .max_by(|&a, &b| {
          sq_dist(matrix.row(a), centroids.row(labels[a]))
            .total_cmp(&sq_dist(matrix.row(b), centroids.row(labels[b])))
        })
        .expect("non-empty matrix");
      counts[j] = 1;
      for c in 0..d {
        sums[[j, c]] = matrix[[far, c]];
      }
      labels[far] = j;
    }

    let mut shift: f64 = 0.0;
    for j in 0..k {
      for c in 0..d {
        let next = sums[[j, c]] / counts[j] as f64;
        shift += (next - centroids[[j, c]]).powi(2);
        centroids[[j, c]] = next;
      }
    }
    if shift < config.tolerance {
      break;
    }
  }

  // Final assignment against the converged centroids.
  let mut wss = 0.0;
  for i in 0..n {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for j in 0..k {
      let dist = sq_dist(matrix.row(i), centroids.row(j));
      if dist < best_d {
        best_d = dist;
        best = j;
      }
    }
    labels[i] = best;
    wss += best_d;
  }

  KMeansFit {
    labels,
    centroids,
    wss,
    iterations,
  }
}

/// Fit k-means with `config.restarts` seeded restarts, keeping the lowest
/// total within-cluster sum of squares.
pub fn fit(matrix: &Array2<f64>, config: &KMeansConfig) -> Result<KMeansFit, AnalysisError> {
  let n = matrix.nrows();
  if config.k == 0 || n < config.k {
    return Err(AnalysisError::InsufficientPopulation {
      rows: n,
      required: config.k.max(1),
    });
  }

  let restarts = config.restarts.max(1);
  let mut best: Option<KMeansFit> = None;
  for r in 0..restarts {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(r as u64));
    let fit = lloyd(matrix, config, &mut rng);
    let improved = best.as_ref().map_or(true, |b| fit.wss < b.wss);
    if improved {
      best = Some(fit);
    }
  }
  Ok(best.expect("restarts >= 1"))
}

/// Lazy (k, WSS) curve for k = 1..=k_max (clamped to the row count).
/// Elbow selection is the caller's decision, not the engine's.
pub fn wss_scan<'a>(
  matrix: &'a Array2<f64>,
  config: &KMeansConfig,
  k_max: usize,
) -> impl Iterator<Item = (usize, f64)> + 'a {
  let base = *config;
  let upper = k_max.min(matrix.nrows());
  (1..=upper).filter_map(move |k| {
    let cfg = KMeansConfig { k, ..base };
    fit(matrix, &cfg).ok().map(|f| (k, f.wss))
  })
}

#[cfg(test)]
mod tests {
  use ndarray::Array2;

  use super::*;

  /// Two well-separated blobs of 6 points each.
  fn two_blobs() -> Array2<f64> {
    let mut flat = Vec::new();
    for i in 0..6 {
      let j = i as f64 * 0.1;
      flat.extend_from_slice(&[j, 0.2 - j]);
    }
    for i in 0..6 {
      let j = i as f64 * 0.1;
      flat.extend_from_slice(&[10.0 + j, 10.2 - j]);
    }
    Array2::from_shape_vec((12, 2), flat).unwrap()
  }

  #[test]
  fn identical_seeds_give_identical_labels() {
    let m = two_blobs();
    let cfg = KMeansConfig {
      k: 2,
      ..KMeansConfig::default()
    };
    let a = fit(&m, &cfg).unwrap();
    let b = fit(&m, &cfg).unwrap();
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.wss, b.wss);
  }

  #[test]
  fn separated_blobs_are_split_cleanly() {
    let m = two_blobs();
    let cfg = KMeansConfig {
      k: 2,
      ..KMeansConfig::default()
    };
    let fit = fit(&m, &cfg).unwrap();
    let first = fit.labels[0];
    assert!(fit.labels[..6].iter().all(|l| *l == first));
    assert!(fit.labels[6..].iter().all(|l| *l != first));
    assert!(fit.wss < 1.0);
  }

  #[test]
  fn population_smaller_than_k_is_rejected() {
    let m = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 1.0, 1.0]).unwrap();
    let cfg = KMeansConfig {
      k: 3,
      ..KMeansConfig::default()
    };
    assert!(matches!(
      fit(&m, &cfg),
      Err(AnalysisError::InsufficientPopulation { rows: 2, required: 3 })
    ));
  }

  #[test]
  fn wss_scan_is_lazy_and_non_increasing_on_separable_data() {
    let m = two_blobs();
    let cfg = KMeansConfig::default();

    let first_three: Vec<(usize, f64)> = wss_scan(&m, &cfg, 15).take(3).collect();
    assert_eq!(first_three.len(), 3);
    assert_eq!(first_three[0].0, 1);
    assert!(first_three[0].1 >= first_three[1].1);
    assert!(first_three[1].1 >= first_three[2].1);

    // Restartable: a fresh scan reproduces the same curve.
    let again: Vec<(usize, f64)> = wss_scan(&m, &cfg, 15).take(3).collect();
    assert_eq!(first_three, again);

    // Clamped to the population size.
    assert_eq!(wss_scan(&m, &cfg, 50).count(), 12);
  }
}
