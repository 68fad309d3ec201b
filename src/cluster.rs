//! # Cluster Engine
//!
//! Partitions the ticker population with one of three selectable modes:
//! seeded centroid clustering (k-means), deterministic density-based
//! hierarchical clustering with an explicit noise label, or k-medoid
//! clustering over dynamic-time-warping distances.
//!
//! Cluster membership is derived, never authoritative: every mode is a
//! pure function of its inputs and parameters, deterministic under a
//! fixed seed (centroid/DTW) or outright (density).

pub mod density;
pub mod dtw;
pub mod kmeans;

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::error::AnalysisError;

/// Reserved label for points no density cluster claims.
pub const NOISE_LABEL: usize = 0;

/// Clustering mode and its parameters.
#[derive(Clone, Debug)]
pub enum ClusterMode {
  /// Seeded k-means over the preprocessed feature matrix.
  Centroid(kmeans::KMeansConfig),
  /// HDBSCAN-style density clustering over the preprocessed feature
  /// matrix; outliers receive [`NOISE_LABEL`].
  Density(density::DensityConfig),
  /// k-medoids over pairwise DTW distances between standardized series.
  Dtw(dtw::DtwConfig),
}

/// Mapping from ticker to integer cluster label.
///
/// Positive labels denote genuine clusters; [`NOISE_LABEL`] marks density
/// outliers. Centroid and DTW labels start at 1 so 0 stays reserved.
#[derive(Clone, Debug)]
pub struct ClusterAssignment {
  tickers: Vec<String>,
  labels: Vec<usize>,
}

impl ClusterAssignment {
  pub fn new(tickers: Vec<String>, labels: Vec<usize>) -> Self {
    assert_eq!(tickers.len(), labels.len());
    Self { tickers, labels }
  }

  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  /// Label for one ticker, if it survived the pipeline.
  pub fn label_of(&self, ticker: &str) -> Option<usize> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.labels[i])
  }

  /// Tickers grouped by label, ascending.
  pub fn by_label(&self) -> BTreeMap<usize, Vec<&str>> {
    let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (ticker, label) in self.tickers.iter().zip(&self.labels) {
      groups.entry(*label).or_default().push(ticker);
    }
    groups
  }

  /// Number of distinct non-noise clusters.
  pub fn n_clusters(&self) -> usize {
    self
      .by_label()
      .keys()
      .filter(|label| **label != NOISE_LABEL)
      .count()
  }

  /// Number of points labeled noise.
  pub fn noise_count(&self) -> usize {
    self.labels.iter().filter(|l| **l == NOISE_LABEL).count()
  }
}

/// Cluster a preprocessed feature matrix under `mode`.
///
/// The DTW mode clusters raw series, not feature rows; dispatch it through
/// the pipeline instead.
pub fn cluster_rows(
  tickers: &[String],
  matrix: &Array2<f64>,
  mode: &ClusterMode,
) -> Result<ClusterAssignment, AnalysisError> {
  let labels = match mode {
    ClusterMode::Centroid(config) => {
      let fit = kmeans::fit(matrix, config)?;
      fit.labels.iter().map(|l| l + 1).collect()
    }
    ClusterMode::Density(config) => density::fit(matrix, config)?.labels,
    ClusterMode::Dtw(_) => {
      return Err(AnalysisError::NumericInstability {
        stage: "cluster dispatch",
        detail: "DTW mode operates on series, not feature rows".to_string(),
      });
    }
  };
  Ok(ClusterAssignment::new(tickers.to_vec(), labels))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn assignment_groups_and_counts() {
    let a = ClusterAssignment::new(
      vec!["AAA".into(), "BBB".into(), "CCC".into(), "DDD".into()],
      vec![1, 2, 1, 0],
    );
    assert_eq!(a.n_clusters(), 2);
    assert_eq!(a.noise_count(), 1);
    assert_eq!(a.label_of("CCC"), Some(1));
    assert_eq!(a.label_of("ZZZ"), None);
    assert_eq!(a.by_label()[&1], vec!["AAA", "CCC"]);
  }
}
