//! # Feature Extractor
//!
//! $$
//! x_{1..n} \mapsto \mathbf{f} \in \mathbb{R}^{22}
//! $$
//!
//! Maps each standardized series to a fixed-length vector of 22 canonical
//! time-series descriptors spanning distributional shape, linear and
//! nonlinear autocorrelation structure, outlier statistics and
//! fluctuation-scaling behavior. Every descriptor is a pure function of
//! the ordered values; extraction is deterministic.

pub mod autocorr;
pub mod distribution;
pub mod extremes;
pub mod scaling;

use ndarray::Array2;
use tracing::warn;

use crate::error::AnalysisError;
use crate::normalize::StandardizedSeries;

/// Number of descriptors per series.
pub const FEATURE_COUNT: usize = 22;

/// Canonical feature names, in extraction order. Identical and
/// order-stable across every batch.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
  "dist_skewness",
  "dist_kurtosis",
  "dist_median",
  "dist_iqr",
  "dist_tail_asymmetry",
  "acf_lag1",
  "acf_lag2",
  "acf_lag10",
  "acf_first_zero",
  "acf_first_under_inv_e",
  "acf_sum_sq_10",
  "trev_asymmetry",
  "auto_mutual_info_lag1",
  "mean_abs_change",
  "mean_crossing_rate",
  "outlier_frac_2sigma",
  "longest_run_above_mean",
  "value_range",
  "dfa_exponent",
  "hurst_rs",
  "variance_ratio_5",
  "higuchi_fd",
];

/// Stride bound for the Higuchi estimator.
const HIGUCHI_KMAX: usize = 10;

/// Extraction options.
#[derive(Clone, Copy, Debug)]
pub struct FeatureConfig {
  /// Minimum observed length for stable estimation; shorter series fail
  /// with an insufficient-data condition instead of producing degenerate
  /// features.
  pub min_len: usize,
}

impl Default for FeatureConfig {
  fn default() -> Self {
    Self { min_len: 60 }
  }
}

/// One ticker's descriptor vector, ordered as [`FEATURE_NAMES`].
#[derive(Clone, Debug)]
pub struct FeatureVector {
  ticker: String,
  values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  pub fn values(&self) -> &[f64; FEATURE_COUNT] {
    &self.values
  }

  /// Value by canonical feature name.
  pub fn get(&self, name: &str) -> Option<f64> {
    FEATURE_NAMES
      .iter()
      .position(|n| *n == name)
      .map(|i| self.values[i])
  }
}

/// Batched feature output: one row per ticker, columns = [`FEATURE_NAMES`].
#[derive(Clone, Debug)]
pub struct FeatureTable {
  tickers: Vec<String>,
  matrix: Array2<f64>,
}

impl FeatureTable {
  /// Assemble a table from pre-computed rows; `matrix` must have one row
  /// per ticker and [`FEATURE_COUNT`] columns.
  pub fn from_parts(tickers: Vec<String>, matrix: Array2<f64>) -> Self {
    assert_eq!(matrix.nrows(), tickers.len());
    assert_eq!(matrix.ncols(), FEATURE_COUNT);
    Self { tickers, matrix }
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn matrix(&self) -> &Array2<f64> {
    &self.matrix
  }

  pub fn n_rows(&self) -> usize {
    self.tickers.len()
  }
}

/// Compute all 22 descriptors for one standardized series.
pub fn extract(
  series: &StandardizedSeries,
  config: &FeatureConfig,
) -> Result<FeatureVector, AnalysisError> {
  // Carried-down calendar slots do not count toward the length
  // requirement; only genuine observations do.
  let x = series.observed();
  if series.n_observations() < config.min_len {
    return Err(AnalysisError::InsufficientData {
      ticker: series.ticker().to_string(),
      len: series.n_observations(),
      min_len: config.min_len,
    });
  }

  let values = [
    distribution::skewness(x),
    distribution::excess_kurtosis(x),
    distribution::median(x),
    distribution::interquartile_range(x),
    distribution::tail_asymmetry(x),
    autocorr::autocorrelation(x, 1),
    autocorr::autocorrelation(x, 2),
    autocorr::autocorrelation(x, 10),
    autocorr::first_zero_crossing(x),
    autocorr::first_below_inv_e(x),
    autocorr::sum_sq_acf10(x),
    autocorr::time_reversal_asymmetry(x),
    autocorr::auto_mutual_information_lag1(x),
    extremes::mean_abs_change(x),
    extremes::mean_crossing_rate(x),
    extremes::outlier_fraction_2sigma(x),
    extremes::longest_run_above_mean(x),
    extremes::value_range(x),
    scaling::dfa_exponent(x),
    scaling::hurst_rescaled_range(x),
    scaling::variance_ratio(x, 5),
    scaling::higuchi_fd(x, HIGUCHI_KMAX),
  ];

  if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
    return Err(AnalysisError::NumericInstability {
      stage: "feature extraction",
      detail: format!(
        "{} produced a non-finite value for {}",
        FEATURE_NAMES[idx],
        series.ticker()
      ),
    });
  }

  Ok(FeatureVector {
    ticker: series.ticker().to_string(),
    values,
  })
}

/// Extract a whole population into a [`FeatureTable`], excluding tickers
/// that fail rather than aborting the batch.
pub fn extract_table(
  series: &[StandardizedSeries],
  config: &FeatureConfig,
) -> (FeatureTable, Vec<(String, AnalysisError)>) {
  let mut tickers = Vec::with_capacity(series.len());
  let mut rows = Vec::with_capacity(series.len() * FEATURE_COUNT);
  let mut excluded = Vec::new();

  for s in series {
    match extract(s, config) {
      Ok(vector) => {
        tickers.push(vector.ticker.clone());
        rows.extend_from_slice(&vector.values);
      }
      Err(err) => {
        warn!(ticker = s.ticker(), %err, "excluding ticker from feature extraction");
        excluded.push((s.ticker().to_string(), err));
      }
    }
  }

  let matrix = Array2::from_shape_vec((tickers.len(), FEATURE_COUNT), rows)
    .expect("row-major feature buffer matches (tickers, FEATURE_COUNT)");
  (FeatureTable { tickers, matrix }, excluded)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::normalize::standardize;
  use crate::types::TickerSeries;
  use crate::types::TradingCalendar;

  fn standardized(ticker: &str, values: Vec<f64>) -> StandardizedSeries {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let obs = values
      .iter()
      .enumerate()
      .map(|(i, v)| (start + chrono::Days::new(i as u64), *v))
      .collect();
    let series = TickerSeries::new(ticker, obs).unwrap();
    let cal = TradingCalendar::from_series(std::slice::from_ref(&series));
    standardize(&series, &cal).unwrap()
  }

  fn wavy(n: usize) -> Vec<f64> {
    (0..n)
      .map(|i| 100.0 + (i as f64 * 0.21).sin() * 5.0 + i as f64 * 0.01)
      .collect()
  }

  #[test]
  fn extraction_is_deterministic() {
    let a = extract(&standardized("AAA", wavy(250)), &FeatureConfig::default()).unwrap();
    let b = extract(&standardized("AAA", wavy(250)), &FeatureConfig::default()).unwrap();
    assert_eq!(a.values(), b.values());
  }

  #[test]
  fn feature_order_matches_names() {
    let v = extract(&standardized("AAA", wavy(250)), &FeatureConfig::default()).unwrap();
    assert_eq!(v.get("acf_lag1"), Some(v.values()[5]));
    assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
  }

  #[test]
  fn short_series_fails_with_insufficient_data() {
    let err = extract(&standardized("AAA", wavy(30)), &FeatureConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientData { .. }));
  }

  #[test]
  fn table_rows_follow_input_order() {
    let series = vec![
      standardized("AAA", wavy(250)),
      standardized("BBB", wavy(300)),
    ];
    let (table, excluded) = extract_table(&series, &FeatureConfig::default());
    assert!(excluded.is_empty());
    assert_eq!(table.tickers(), &["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(table.matrix().dim(), (2, FEATURE_COUNT));
  }
}
