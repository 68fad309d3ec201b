//! # Price Normalizer
//!
//! $$
//! z_t = \frac{p_t - \bar p}{s_p}
//! $$
//!
//! Reindexes every ticker onto the shared trading calendar, fills interior
//! gaps by carrying the last known price down (fill direction = down: the
//! earlier value persists until a new observation arrives), and z-scores
//! each ticker over its observed range. Leading gaps stay missing (`NaN`)
//! and are never filled.

use statrs::statistics::Statistics;
use tracing::warn;

use crate::error::AnalysisError;
use crate::types::TickerSeries;
use crate::types::TradingCalendar;

/// Variance below this is treated as zero (degenerate series).
const VARIANCE_TOLERANCE: f64 = 1e-12;

/// A gap-filled, z-scored series on the shared calendar.
///
/// Values before the ticker's first observation are `NaN`.
#[derive(Clone, Debug)]
pub struct StandardizedSeries {
  ticker: String,
  values: Vec<f64>,
  first_observed: usize,
  n_observations: usize,
  mean: f64,
  std_dev: f64,
}

impl StandardizedSeries {
  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  /// Number of genuine source observations, as opposed to carried-down
  /// calendar slots. Length checks must use this, not the filled length.
  pub fn n_observations(&self) -> usize {
    self.n_observations
  }

  /// Full calendar-aligned values, `NaN` before the first observation.
  pub fn values(&self) -> &[f64] {
    &self.values
  }

  /// Values from the first observation onward; never contains `NaN`.
  pub fn observed(&self) -> &[f64] {
    &self.values[self.first_observed..]
  }

  /// Calendar index of the first observation.
  pub fn first_observed(&self) -> usize {
    self.first_observed
  }

  /// Fitted price mean used for standardization.
  pub fn price_mean(&self) -> f64 {
    self.mean
  }

  /// Fitted price standard deviation used for standardization.
  pub fn price_std_dev(&self) -> f64 {
    self.std_dev
  }
}

/// Reindex a series onto `calendar`, carrying the last known value down
/// into interior and trailing gaps. Leading dates before the first
/// observation are `NaN`.
pub fn reindex_carry_down(series: &TickerSeries, calendar: &TradingCalendar) -> Vec<f64> {
  let mut out = Vec::with_capacity(calendar.len());
  let dates = series.dates();
  let values = series.values();
  let mut next = 0usize;
  let mut last: Option<f64> = None;

  for day in calendar.dates() {
    while next < dates.len() && dates[next] <= *day {
      last = Some(values[next]);
      next += 1;
    }
    out.push(last.unwrap_or(f64::NAN));
  }
  out
}

/// Standardize one ticker over the shared calendar.
///
/// Fails with [`AnalysisError::DegenerateSeries`] when the observed range
/// has (effectively) zero variance, and with
/// [`AnalysisError::InsufficientData`] when nothing is observed at all.
pub fn standardize(
  series: &TickerSeries,
  calendar: &TradingCalendar,
) -> Result<StandardizedSeries, AnalysisError> {
  let filled = reindex_carry_down(series, calendar);
  let first_observed = filled.iter().position(|v| v.is_finite()).ok_or_else(|| {
    AnalysisError::InsufficientData {
      ticker: series.ticker().to_string(),
      len: 0,
      min_len: 1,
    }
  })?;

  let observed = &filled[first_observed..];
  let mean = observed.mean();
  let std_dev = observed.std_dev();
  if !std_dev.is_finite() || std_dev * std_dev < VARIANCE_TOLERANCE {
    return Err(AnalysisError::DegenerateSeries {
      ticker: series.ticker().to_string(),
    });
  }

  let values = filled
    .iter()
    .map(|v| if v.is_finite() { (v - mean) / std_dev } else { f64::NAN })
    .collect();

  Ok(StandardizedSeries {
    ticker: series.ticker().to_string(),
    values,
    first_observed,
    n_observations: series.len(),
    mean,
    std_dev,
  })
}

/// Standardize a whole population, excluding (not aborting on) tickers that
/// fail. Exclusions are returned alongside the survivors and logged.
pub fn standardize_all(
  series: &[TickerSeries],
  calendar: &TradingCalendar,
) -> (Vec<StandardizedSeries>, Vec<(String, AnalysisError)>) {
  let mut kept = Vec::with_capacity(series.len());
  let mut excluded = Vec::new();
  for s in series {
    match standardize(s, calendar) {
      Ok(std) => kept.push(std),
      Err(err) => {
        warn!(ticker = s.ticker(), %err, "excluding ticker from standardization");
        excluded.push((s.ticker().to_string(), err));
      }
    }
  }
  (kept, excluded)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::reindex_carry_down;
  use super::standardize;
  use crate::error::AnalysisError;
  use crate::types::TickerSeries;
  use crate::types::TradingCalendar;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn daily_series(ticker: &str, start: NaiveDate, values: &[f64]) -> TickerSeries {
    let obs = values
      .iter()
      .enumerate()
      .map(|(i, v)| (start + chrono::Days::new(i as u64), *v))
      .collect();
    TickerSeries::new(ticker, obs).unwrap()
  }

  #[test]
  fn standardized_series_has_zero_mean_unit_variance() {
    let s = daily_series("AAA", d(2020, 1, 1), &[10.0, 11.0, 13.0, 12.0, 15.0, 14.0]);
    let cal = TradingCalendar::from_series(std::slice::from_ref(&s));
    let z = standardize(&s, &cal).unwrap();

    let obs = z.observed();
    let mean = obs.iter().sum::<f64>() / obs.len() as f64;
    let var =
      obs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (obs.len() as f64 - 1.0);
    assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
  }

  #[test]
  fn interior_gaps_carry_the_earlier_value_down() {
    let a = daily_series("AAA", d(2020, 1, 1), &[1.0, 2.0, 3.0, 4.0]);
    let b = TickerSeries::new(
      "BBB",
      vec![(d(2020, 1, 1), 10.0), (d(2020, 1, 4), 40.0)],
    )
    .unwrap();
    let cal = TradingCalendar::from_series(&[a, b.clone()]);
    let filled = reindex_carry_down(&b, &cal);
    assert_eq!(filled, vec![10.0, 10.0, 10.0, 40.0]);
  }

  #[test]
  fn leading_gaps_stay_missing() {
    let a = daily_series("AAA", d(2020, 1, 1), &[1.0, 2.0, 3.0, 4.0]);
    let late = TickerSeries::new(
      "BBB",
      vec![(d(2020, 1, 3), 5.0), (d(2020, 1, 4), 6.0)],
    )
    .unwrap();
    let cal = TradingCalendar::from_series(&[a, late.clone()]);
    let z = standardize(&late, &cal).unwrap();

    assert!(z.values()[0].is_nan());
    assert!(z.values()[1].is_nan());
    assert_eq!(z.first_observed(), 2);
    assert!(z.observed().iter().all(|v| v.is_finite()));
  }

  #[test]
  fn zero_variance_series_is_rejected() {
    let flat = daily_series("FLAT", d(2020, 1, 1), &[7.0; 30]);
    let cal = TradingCalendar::from_series(std::slice::from_ref(&flat));
    let err = standardize(&flat, &cal).unwrap_err();
    assert!(matches!(err, AnalysisError::DegenerateSeries { .. }));
  }
}
