//! # Feature Preprocessor
//!
//! $$
//! \tilde X = \frac{X - \mu}{\sigma}, \qquad Y = \tilde X W_{1..m}
//! $$
//!
//! Population-level column standardization and optional PCA projection.
//! Both are fitted once on a reference population and travel together as
//! an explicit [`FittedPreprocess`] value, so windowed sub-populations can
//! be projected onto the same basis without refitting.

use nalgebra::DMatrix;
use nalgebra::SymmetricEigen;
use ndarray::Array2;
use tracing::debug;

use crate::error::AnalysisError;
use crate::features::FEATURE_NAMES;
use crate::features::FeatureTable;

/// Preprocessing options.
#[derive(Clone, Copy, Debug)]
pub struct PreprocessConfig {
  /// Columns whose population variance falls below this are excluded
  /// before standardization.
  pub variance_tolerance: f64,
  /// PCA projection; `None` keeps the scaled feature space.
  pub pca: Option<PcaConfig>,
}

impl Default for PreprocessConfig {
  fn default() -> Self {
    Self {
      variance_tolerance: 1e-10,
      pca: Some(PcaConfig::default()),
    }
  }
}

/// PCA options.
#[derive(Clone, Copy, Debug)]
pub struct PcaConfig {
  /// Retain the smallest component count whose cumulative explained
  /// variance reaches this threshold.
  pub explained_variance: f64,
}

impl Default for PcaConfig {
  fn default() -> Self {
    Self {
      explained_variance: 0.95,
    }
  }
}

/// Column-wise standardization fitted on a reference population.
#[derive(Clone, Debug)]
pub struct ColumnScaler {
  kept: Vec<usize>,
  means: Vec<f64>,
  std_devs: Vec<f64>,
  dropped: Vec<&'static str>,
}

impl ColumnScaler {
  /// Fit means and standard deviations per feature column, excluding
  /// near-constant columns.
  pub fn fit(table: &FeatureTable, variance_tolerance: f64) -> Self {
    let matrix = table.matrix();
    let n = matrix.nrows() as f64;
    let mut kept = Vec::new();
    let mut means = Vec::new();
    let mut std_devs = Vec::new();
    let mut dropped = Vec::new();

    for col in 0..matrix.ncols() {
      let column = matrix.column(col);
      let mean = column.sum() / n;
      let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
      if var < variance_tolerance {
        dropped.push(FEATURE_NAMES[col]);
        continue;
      }
      kept.push(col);
      means.push(mean);
      std_devs.push(var.sqrt());
    }

    if !dropped.is_empty() {
      debug!(?dropped, "excluding near-constant feature columns");
    }
    Self {
      kept,
      means,
      std_devs,
      dropped,
    }
  }

  /// Indices of retained feature columns.
  pub fn kept_columns(&self) -> &[usize] {
    &self.kept
  }

  /// Names of the columns excluded as near-constant.
  pub fn dropped_columns(&self) -> &[&'static str] {
    &self.dropped
  }

  /// Select the retained columns and standardize them with the fitted
  /// statistics.
  pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
    let n = matrix.nrows();
    let mut out = Array2::zeros((n, self.kept.len()));
    for (j, &col) in self.kept.iter().enumerate() {
      for i in 0..n {
        out[[i, j]] = (matrix[[i, col]] - self.means[j]) / self.std_devs[j];
      }
    }
    out
  }
}

/// Orthogonal projection fitted on a reference population.
#[derive(Clone, Debug)]
pub struct Pca {
  means: Vec<f64>,
  /// Column j is the j-th principal axis.
  components: DMatrix<f64>,
  explained_ratio: Vec<f64>,
  retained: usize,
}

impl Pca {
  /// Fit the projection on `x` (rows = observations) and choose the
  /// smallest component count whose cumulative explained-variance ratio
  /// reaches `threshold`.
  pub fn fit(x: &Array2<f64>, threshold: f64) -> Result<Self, AnalysisError> {
    let n = x.nrows();
    let d = x.ncols();
    if n < 2 {
      return Err(AnalysisError::InsufficientPopulation {
        rows: n,
        required: 2,
      });
    }

    let means: Vec<f64> = (0..d).map(|j| x.column(j).sum() / n as f64).collect();
    let mut cov = DMatrix::<f64>::zeros(d, d);
    for a in 0..d {
      for b in a..d {
        let mut acc = 0.0;
        for i in 0..n {
          acc += (x[[i, a]] - means[a]) * (x[[i, b]] - means[b]);
        }
        let c = acc / (n as f64 - 1.0);
        cov[(a, b)] = c;
        cov[(b, a)] = c;
      }
    }

    let eigen = SymmetricEigen::new(cov);
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
      return Err(AnalysisError::NumericInstability {
        stage: "pca",
        detail: "eigenvalue spectrum is degenerate or non-finite".to_string(),
      });
    }

    let explained_ratio: Vec<f64> = order
      .iter()
      .map(|&i| eigen.eigenvalues[i].max(0.0) / total)
      .collect();

    let mut retained = d;
    let mut cumulative = 0.0;
    for (count, ratio) in explained_ratio.iter().enumerate() {
      cumulative += ratio;
      if cumulative >= threshold {
        retained = count + 1;
        break;
      }
    }

    let mut components = DMatrix::<f64>::zeros(d, d);
    for (j, &i) in order.iter().enumerate() {
      components.set_column(j, &eigen.eigenvectors.column(i));
    }

    Ok(Self {
      means,
      components,
      explained_ratio,
      retained,
    })
  }

  /// Number of retained components.
  pub fn retained(&self) -> usize {
    self.retained
  }

  /// Explained-variance ratios in descending component order.
  pub fn explained_variance_ratio(&self) -> &[f64] {
    &self.explained_ratio
  }

  /// Project rows of `x` onto the retained components of the fitted basis.
  pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let d = self.means.len();
    let mut centered = DMatrix::<f64>::zeros(n, d);
    for i in 0..n {
      for j in 0..d {
        centered[(i, j)] = x[[i, j]] - self.means[j];
      }
    }
    let projected = centered * self.components.columns(0, self.retained);
    let mut out = Array2::zeros((n, self.retained));
    for i in 0..n {
      for j in 0..self.retained {
        out[[i, j]] = projected[(i, j)];
      }
    }
    out
  }
}

/// The fitted preprocessing state, passed around explicitly so windowed
/// sub-analyses reuse the reference transform instead of refitting it.
#[derive(Clone, Debug)]
pub struct FittedPreprocess {
  scaler: ColumnScaler,
  pca: Option<Pca>,
}

impl FittedPreprocess {
  /// Fit scaler (and PCA, when configured) on a reference feature table.
  pub fn fit(table: &FeatureTable, config: &PreprocessConfig) -> Result<Self, AnalysisError> {
    let scaler = ColumnScaler::fit(table, config.variance_tolerance);
    let scaled = scaler.transform(table.matrix());
    let pca = match config.pca {
      Some(pca_cfg) => Some(Pca::fit(&scaled, pca_cfg.explained_variance)?),
      None => None,
    };
    Ok(Self { scaler, pca })
  }

  pub fn scaler(&self) -> &ColumnScaler {
    &self.scaler
  }

  pub fn pca(&self) -> Option<&Pca> {
    self.pca.as_ref()
  }

  /// Apply the fitted transform to a (possibly different) batch.
  pub fn transform(&self, table: &FeatureTable) -> Array2<f64> {
    let scaled = self.scaler.transform(table.matrix());
    match &self.pca {
      Some(pca) => pca.transform(&scaled),
      None => scaled,
    }
  }
}
