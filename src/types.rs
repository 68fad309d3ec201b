//! Core value objects shared by every stage: raw bars, per-ticker series
//! and the shared trading calendar.
//!
//! All of these are immutable after construction; derived artifacts are
//! produced by later stages rather than edited in place.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::AnalysisError;

/// One daily observation as delivered by the external acquisition
/// collaborator. Derived return columns of the source table are recomputed
/// downstream, not stored.
#[derive(Clone, Debug)]
pub struct PriceBar {
  pub ticker: String,
  pub date: NaiveDate,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  pub volume: f64,
  /// Split/dividend adjusted close; the price the pipeline analyzes.
  pub adjusted: f64,
}

/// Ordered per-ticker price series over trading dates.
///
/// Invariant: dates are strictly increasing, no duplicates.
#[derive(Clone, Debug)]
pub struct TickerSeries {
  ticker: String,
  dates: Vec<NaiveDate>,
  values: Vec<f64>,
}

impl TickerSeries {
  /// Build a series from date-ordered observations.
  pub fn new(
    ticker: impl Into<String>,
    observations: Vec<(NaiveDate, f64)>,
  ) -> Result<Self, AnalysisError> {
    let ticker = ticker.into();
    for pair in observations.windows(2) {
      if pair[1].0 <= pair[0].0 {
        return Err(AnalysisError::UnorderedDates { ticker });
      }
    }
    let (dates, values) = observations.into_iter().unzip();
    Ok(Self {
      ticker,
      dates,
      values,
    })
  }

  /// Group raw bars into adjusted-close series, one per ticker.
  ///
  /// Bars are sorted per ticker; when the same (ticker, date) appears more
  /// than once the last bar wins.
  pub fn from_bars(bars: &[PriceBar]) -> Vec<TickerSeries> {
    let mut grouped: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for bar in bars {
      grouped
        .entry(bar.ticker.as_str())
        .or_default()
        .insert(bar.date, bar.adjusted);
    }
    grouped
      .into_iter()
      .map(|(ticker, obs)| {
        let (dates, values) = obs.into_iter().unzip();
        Self {
          ticker: ticker.to_string(),
          dates,
          values,
        }
      })
      .collect()
  }

  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn values(&self) -> &[f64] {
    &self.values
  }

  /// First and last observation dates, if any.
  pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
    Some((*self.dates.first()?, *self.dates.last()?))
  }

  /// Sub-series restricted to `[from, to]` (inclusive).
  pub fn restrict(&self, from: NaiveDate, to: NaiveDate) -> TickerSeries {
    let start = self.dates.partition_point(|d| *d < from);
    let end = self.dates.partition_point(|d| *d <= to);
    TickerSeries {
      ticker: self.ticker.clone(),
      dates: self.dates[start..end].to_vec(),
      values: self.values[start..end].to_vec(),
    }
  }

  /// Last observed value on or before `date`.
  pub fn last_value_on_or_before(&self, date: NaiveDate) -> Option<f64> {
    let idx = self.dates.partition_point(|d| *d <= date);
    if idx == 0 {
      None
    } else {
      Some(self.values[idx - 1])
    }
  }
}

/// Sorted union of all observed trading dates across a population.
#[derive(Clone, Debug)]
pub struct TradingCalendar {
  dates: Vec<NaiveDate>,
}

impl TradingCalendar {
  /// Union calendar over a set of series.
  pub fn from_series(series: &[TickerSeries]) -> Self {
    let union: BTreeSet<NaiveDate> = series
      .iter()
      .flat_map(|s| s.dates().iter().copied())
      .collect();
    Self {
      dates: union.into_iter().collect(),
    }
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  /// First and last calendar dates, if any.
  pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
    Some((*self.dates.first()?, *self.dates.last()?))
  }

  /// Calendar restricted to `[from, to]` (inclusive).
  pub fn restrict(&self, from: NaiveDate, to: NaiveDate) -> TradingCalendar {
    let start = self.dates.partition_point(|d| *d < from);
    let end = self.dates.partition_point(|d| *d <= to);
    TradingCalendar {
      dates: self.dates[start..end].to_vec(),
    }
  }
}
