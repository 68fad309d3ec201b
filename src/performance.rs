//! # Performance Evaluator
//!
//! $$
//! \mathrm{AP} = \left(\prod_m (1+r_m)\right)^{12/n} - \left(\prod_m (1+b_m)\right)^{12/n}
//! $$
//!
//! Monthly return series from daily adjusted closes, CAPM-style statistics
//! against a benchmark, and per-cluster aggregation. A ticker or benchmark
//! missing return data yields NaN statistics for that ticker, never a
//! pipeline-wide failure; aggregations skip non-finite values.

use std::collections::BTreeMap;

use chrono::Datelike;
use chrono::NaiveDate;
use tracing::debug;

use crate::cluster::ClusterAssignment;
use crate::cluster::NOISE_LABEL;
use crate::types::TickerSeries;

/// Calendar month key `(year, month)`.
pub type MonthKey = (i32, u32);

/// Monthly simple returns for one instrument, keyed by calendar month.
///
/// A month whose immediately preceding calendar month has no observation
/// carries `NaN` instead of a gap-spanning return.
#[derive(Clone, Debug)]
pub struct MonthlyReturns {
  ticker: String,
  returns: BTreeMap<MonthKey, f64>,
}

impl MonthlyReturns {
  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  pub fn returns(&self) -> &BTreeMap<MonthKey, f64> {
    &self.returns
  }

  /// Finite returns in month order.
  pub fn finite_values(&self) -> Vec<f64> {
    self.returns.values().copied().filter(|r| r.is_finite()).collect()
  }
}

fn previous_month(key: MonthKey) -> MonthKey {
  let (year, month) = key;
  if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

/// Month-end closes within `[from, to]`, keyed by month.
fn month_end_closes(
  series: &TickerSeries,
  from: NaiveDate,
  to: NaiveDate,
) -> BTreeMap<MonthKey, f64> {
  let restricted = series.restrict(from, to);
  let mut closes = BTreeMap::new();
  for (date, value) in restricted.dates().iter().zip(restricted.values()) {
    closes.insert((date.year(), date.month()), *value);
  }
  closes
}

/// Periodic (monthly) simple returns over `[from, to]`, sampled at the
/// last observation of each calendar month.
pub fn monthly_returns(series: &TickerSeries, from: NaiveDate, to: NaiveDate) -> MonthlyReturns {
  let closes = month_end_closes(series, from, to);
  let mut returns = BTreeMap::new();
  for (key, close) in &closes {
    match closes.get(&previous_month(*key)) {
      Some(prev) if *prev != 0.0 => {
        returns.insert(*key, close / prev - 1.0);
      }
      Some(_) => {
        returns.insert(*key, f64::NAN);
      }
      None => {
        // The first observed month has no return at all; a month that
        // follows a gap is NaN rather than a gap-spanning return.
        if closes.keys().next() != Some(key) {
          returns.insert(*key, f64::NAN);
        }
      }
    }
  }
  MonthlyReturns {
    ticker: series.ticker().to_string(),
    returns,
  }
}

/// Annualize a monthly simple-return series: `(prod(1 + r))^(12/n) - 1`,
/// skipping non-finite entries. `NaN` when nothing is finite.
pub fn annualized_monthly_return(returns: &[f64]) -> f64 {
  let finite: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
  if finite.is_empty() {
    return f64::NAN;
  }
  let growth: f64 = finite.iter().map(|r| 1.0 + r).product();
  if growth <= 0.0 {
    return f64::NAN;
  }
  growth.powf(12.0 / finite.len() as f64) - 1.0
}

/// Active premium: difference of annualized returns over the same months.
pub fn active_premium(ticker_returns: &[f64], benchmark_returns: &[f64]) -> f64 {
  annualized_monthly_return(ticker_returns) - annualized_monthly_return(benchmark_returns)
}

/// CAPM-style statistics for one ticker against the benchmark, together
/// with the monthly return series they derive from.
#[derive(Clone, Debug)]
pub struct CapmStats {
  pub ticker: String,
  /// The ticker's monthly returns over the evaluated range.
  pub monthly: MonthlyReturns,
  /// Months with a finite return for both ticker and benchmark.
  pub n_months: usize,
  pub annualized_return: f64,
  pub benchmark_annualized: f64,
  /// Regression slope of ticker on benchmark monthly returns.
  pub beta: f64,
  /// Annualized return unexplained by benchmark exposure.
  pub alpha: f64,
  /// Annualized ticker return minus annualized benchmark return.
  pub active_premium: f64,
}

/// Compute CAPM statistics on months where both series have finite
/// returns. Fewer than two common months yields NaN statistics.
pub fn capm_stats(ticker: &MonthlyReturns, benchmark: &MonthlyReturns) -> CapmStats {
  let mut rt = Vec::new();
  let mut rb = Vec::new();
  for (key, r) in ticker.returns() {
    if let Some(b) = benchmark.returns().get(key) {
      if r.is_finite() && b.is_finite() {
        rt.push(*r);
        rb.push(*b);
      }
    }
  }

  let n = rt.len();
  if n < 2 {
    return CapmStats {
      ticker: ticker.ticker().to_string(),
      monthly: ticker.clone(),
      n_months: n,
      annualized_return: f64::NAN,
      benchmark_annualized: f64::NAN,
      beta: f64::NAN,
      alpha: f64::NAN,
      active_premium: f64::NAN,
    };
  }

  let ann_t = annualized_monthly_return(&rt);
  let ann_b = annualized_monthly_return(&rb);

  let mean_t = rt.iter().sum::<f64>() / n as f64;
  let mean_b = rb.iter().sum::<f64>() / n as f64;
  let mut cov = 0.0;
  let mut var_b = 0.0;
  for i in 0..n {
    cov += (rt[i] - mean_t) * (rb[i] - mean_b);
    var_b += (rb[i] - mean_b).powi(2);
  }
  let beta = if var_b > 0.0 { cov / var_b } else { f64::NAN };
  let alpha = ann_t - beta * ann_b;

  CapmStats {
    ticker: ticker.ticker().to_string(),
    monthly: ticker.clone(),
    n_months: n,
    annualized_return: ann_t,
    benchmark_annualized: ann_b,
    beta,
    alpha,
    active_premium: ann_t - ann_b,
  }
}

/// Median of the finite entries; `NaN` when none are.
pub fn nan_median(values: &[f64]) -> f64 {
  let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
  if finite.is_empty() {
    return f64::NAN;
  }
  finite.sort_by(|a, b| a.total_cmp(b));
  let n = finite.len();
  if n % 2 == 1 {
    finite[n / 2]
  } else {
    (finite[n / 2 - 1] + finite[n / 2]) / 2.0
  }
}

/// Per-cluster aggregate over its constituents.
#[derive(Clone, Debug)]
pub struct ClusterPerformance {
  pub label: usize,
  pub tickers: Vec<String>,
  /// Constituents with finite active premium.
  pub n_evaluated: usize,
  pub median_active_premium: f64,
}

/// Performance records for one evaluated date range.
#[derive(Clone, Debug)]
pub struct PerformanceReport {
  pub window_label: Option<String>,
  pub from: NaiveDate,
  pub to: NaiveDate,
  pub per_ticker: Vec<CapmStats>,
  pub per_cluster: Vec<ClusterPerformance>,
}

/// Evaluate every cluster of `assignment` over `[from, to]` against the
/// benchmark series. Noise members are evaluated per ticker but excluded
/// from cluster aggregates.
pub fn evaluate(
  assignment: &ClusterAssignment,
  series: &[TickerSeries],
  benchmark: &TickerSeries,
  from: NaiveDate,
  to: NaiveDate,
  window_label: Option<String>,
) -> PerformanceReport {
  let by_ticker: BTreeMap<&str, &TickerSeries> =
    series.iter().map(|s| (s.ticker(), s)).collect();
  let benchmark_monthly = monthly_returns(benchmark, from, to);

  let mut per_ticker = Vec::with_capacity(assignment.len());
  for ticker in assignment.tickers() {
    match by_ticker.get(ticker.as_str()) {
      Some(s) => {
        let monthly = monthly_returns(s, from, to);
        per_ticker.push(capm_stats(&monthly, &benchmark_monthly));
      }
      None => {
        // Present in the assignment, absent from the price table: a
        // missing join key is an exclusion, not a failure.
        debug!(ticker = %ticker, "no price series for assigned ticker");
        per_ticker.push(CapmStats {
          ticker: ticker.clone(),
          monthly: MonthlyReturns {
            ticker: ticker.clone(),
            returns: BTreeMap::new(),
          },
          n_months: 0,
          annualized_return: f64::NAN,
          benchmark_annualized: f64::NAN,
          beta: f64::NAN,
          alpha: f64::NAN,
          active_premium: f64::NAN,
        });
      }
    }
  }

  let premium_of: BTreeMap<&str, f64> = per_ticker
    .iter()
    .map(|s| (s.ticker.as_str(), s.active_premium))
    .collect();

  let mut per_cluster = Vec::new();
  for (label, members) in assignment.by_label() {
    if label == NOISE_LABEL {
      continue;
    }
    let premiums: Vec<f64> = members
      .iter()
      .filter_map(|t| premium_of.get(*t).copied())
      .collect();
    let n_evaluated = premiums.iter().filter(|p| p.is_finite()).count();
    per_cluster.push(ClusterPerformance {
      label,
      tickers: members.iter().map(|t| t.to_string()).collect(),
      n_evaluated,
      median_active_premium: nan_median(&premiums),
    });
  }

  PerformanceReport {
    window_label,
    from,
    to,
    per_ticker,
    per_cluster,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::types::TickerSeries;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn active_premium_matches_the_annualization_formula_end_to_end() {
    let ticker = [0.01, 0.02, -0.01];
    let benchmark = [0.00, 0.01, 0.00];

    let expected_ticker = (1.01f64 * 1.02 * 0.99).powf(12.0 / 3.0) - 1.0;
    let expected_benchmark = (1.0f64 * 1.01 * 1.0).powf(12.0 / 3.0) - 1.0;

    let premium = active_premium(&ticker, &benchmark);
    assert_abs_diff_eq!(
      premium,
      expected_ticker - expected_benchmark,
      epsilon = 1e-12
    );
  }

  #[test]
  fn monthly_returns_sample_the_last_observation_of_each_month() {
    let s = TickerSeries::new(
      "AAA",
      vec![
        (d(2020, 1, 10), 100.0),
        (d(2020, 1, 31), 110.0),
        (d(2020, 2, 14), 105.0),
        (d(2020, 2, 28), 121.0),
        (d(2020, 3, 31), 133.1),
      ],
    )
    .unwrap();
    let monthly = monthly_returns(&s, d(2020, 1, 1), d(2020, 12, 31));
    let feb = monthly.returns()[&(2020, 2)];
    let mar = monthly.returns()[&(2020, 3)];
    assert_abs_diff_eq!(feb, 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(mar, 0.1, epsilon = 1e-12);
    assert!(!monthly.returns().contains_key(&(2020, 1)));
  }

  #[test]
  fn a_skipped_month_yields_nan_not_a_gap_spanning_return() {
    let s = TickerSeries::new(
      "AAA",
      vec![
        (d(2020, 1, 31), 100.0),
        (d(2020, 2, 28), 110.0),
        (d(2020, 4, 30), 121.0),
      ],
    )
    .unwrap();
    let monthly = monthly_returns(&s, d(2020, 1, 1), d(2020, 12, 31));
    assert!(monthly.returns()[&(2020, 4)].is_nan());
    assert_abs_diff_eq!(monthly.returns()[&(2020, 2)], 0.1, epsilon = 1e-12);
  }

  #[test]
  fn median_skips_nan_entries() {
    let values = [f64::NAN, 0.03, f64::NAN, 0.01, 0.02];
    assert_abs_diff_eq!(nan_median(&values), 0.02, epsilon = 1e-12);
    assert!(nan_median(&[f64::NAN]).is_nan());
  }

  #[test]
  fn beta_of_a_doubled_benchmark_is_two() {
    // Benchmark alternates +1% / -1%; the ticker moves twice as far.
    let mut bench_px = 100.0;
    let mut ticker_px = 100.0;
    let mut bench_obs = vec![(d(2020, 1, 28), bench_px)];
    let mut ticker_obs = vec![(d(2020, 1, 28), ticker_px)];
    for m in 2..=12u32 {
      let up = m % 2 == 0;
      bench_px *= if up { 1.01 } else { 0.99 };
      ticker_px *= if up { 1.02 } else { 0.98 };
      bench_obs.push((d(2020, m, 28), bench_px));
      ticker_obs.push((d(2020, m, 28), ticker_px));
    }
    let bench = TickerSeries::new("SPX", bench_obs).unwrap();
    let ticker = TickerSeries::new("AAA", ticker_obs).unwrap();

    let stats = capm_stats(
      &monthly_returns(&ticker, d(2020, 1, 1), d(2020, 12, 31)),
      &monthly_returns(&bench, d(2020, 1, 1), d(2020, 12, 31)),
    );
    assert_eq!(stats.n_months, 11);
    assert_abs_diff_eq!(stats.beta, 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(
      stats.active_premium,
      stats.annualized_return - stats.benchmark_annualized,
      epsilon = 1e-12
    );
  }
}
