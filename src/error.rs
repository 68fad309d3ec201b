//! Error kinds shared by every analysis stage.
//!
//! Stage-local failures (short series, degenerate standardization,
//! non-finite features) degrade to exclusion of the offending ticker or
//! window; [`AnalysisError::InsufficientPopulation`] is the one hard-fail
//! condition, since clustering cannot proceed below it.

use thiserror::Error;

/// Failure conditions raised by the analytical pipeline.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
  /// Series or window too short for stable estimation.
  #[error("insufficient data for {ticker}: {len} observations, need at least {min_len}")]
  InsufficientData {
    ticker: String,
    len: usize,
    min_len: usize,
  },

  /// Zero-variance series; standardization is undefined.
  #[error("degenerate series for {ticker}: variance is zero over the observed range")]
  DegenerateSeries { ticker: String },

  /// Observation dates are not strictly increasing.
  #[error("series for {ticker} must have strictly increasing dates")]
  UnorderedDates { ticker: String },

  /// Population smaller than the clustering parameters require.
  #[error("insufficient population: {rows} rows, clustering requires at least {required}")]
  InsufficientPopulation { rows: usize, required: usize },

  /// A numeric routine produced non-finite values.
  #[error("numeric instability in {stage}: {detail}")]
  NumericInstability { stage: &'static str, detail: String },
}
