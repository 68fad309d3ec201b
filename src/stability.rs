//! # Temporal Stability Analyzer
//!
//! $$
//! \{W_1..W_m\} \mapsto \{(\text{ticker}, [\ell_{W_i}])\}
//! $$
//!
//! Repeats the full pipeline over sliding trailing windows of calendar
//! years and aggregates per-ticker label history to assess membership
//! stability. Windows share only read-only inputs and produce disjoint
//! outputs, so they are evaluated in parallel.

use std::collections::BTreeMap;

use chrono::Datelike;
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::warn;

use crate::error::AnalysisError;
use crate::pipeline::ClusterPipeline;
use crate::preprocess::FittedPreprocess;
use crate::types::TickerSeries;
use crate::types::TradingCalendar;

/// Sliding-window layout.
#[derive(Clone, Copy, Debug)]
pub struct WindowConfig {
  /// Trailing window length in calendar years.
  pub window_years: i32,
  /// Step between consecutive windows in calendar years.
  pub step_years: i32,
}

impl Default for WindowConfig {
  fn default() -> Self {
    Self {
      window_years: 5,
      step_years: 1,
    }
  }
}

/// One evaluated window: a span of whole calendar years.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisWindow {
  /// Window label, e.g. `"2012-2016"`.
  pub label: String,
  pub from: NaiveDate,
  pub to: NaiveDate,
}

/// Generate trailing windows over the observed span, skipping incomplete
/// leading (and trailing) windows: a window is only evaluated once its
/// full trailing length of history exists.
pub fn trailing_windows(calendar: &TradingCalendar, config: &WindowConfig) -> Vec<AnalysisWindow> {
  let Some((first, last)) = calendar.span() else {
    return Vec::new();
  };
  let mut windows = Vec::new();
  if config.window_years < 1 || config.step_years < 1 {
    return windows;
  }

  let mut start_year = first.year();
  loop {
    let end_year = start_year + config.window_years - 1;
    let Some(window_start) = NaiveDate::from_ymd_opt(start_year, 1, 1) else {
      break;
    };
    let Some(window_end) = NaiveDate::from_ymd_opt(end_year, 12, 31) else {
      break;
    };
    if window_end.year() > last.year() {
      break;
    }

    // Completeness: history must begin by the end of the window's first
    // January and extend into the window's final December.
    let january_cutoff = NaiveDate::from_ymd_opt(start_year, 1, 31);
    let december_floor = NaiveDate::from_ymd_opt(end_year, 12, 1);
    let complete = january_cutoff.is_some_and(|cutoff| first <= cutoff)
      && december_floor.is_some_and(|floor| last >= floor);
    if complete {
      windows.push(AnalysisWindow {
        label: format!("{start_year}-{end_year}"),
        from: window_start.max(first),
        to: window_end.min(last),
      });
    }

    start_year += config.step_years;
  }
  windows
}

/// Per-ticker label history across windows, produced by an outer join: a
/// ticker absent from a window simply has no entry for it.
#[derive(Clone, Debug, Default)]
pub struct WindowedClusterHistory {
  entries: BTreeMap<String, Vec<(String, usize)>>,
}

impl WindowedClusterHistory {
  /// Merge one window's assignment into the history.
  fn absorb(&mut self, window_label: &str, tickers: &[String], labels: &[usize]) {
    for (ticker, label) in tickers.iter().zip(labels) {
      self
        .entries
        .entry(ticker.clone())
        .or_default()
        .push((window_label.to_string(), *label));
    }
  }

  pub fn tickers(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(|k| k.as_str())
  }

  /// `(window label, cluster label)` pairs for one ticker, in window
  /// order; `None` when the ticker never clustered.
  pub fn history_of(&self, ticker: &str) -> Option<&[(String, usize)]> {
    self.entries.get(ticker).map(|v| v.as_slice())
  }

  /// Per-ticker summary statistics.
  pub fn ticker_stats(&self) -> Vec<TickerStability> {
    self
      .entries
      .iter()
      .map(|(ticker, history)| {
        let mut label_counts: BTreeMap<usize, usize> = BTreeMap::new();
        for (_, label) in history {
          *label_counts.entry(*label).or_insert(0) += 1;
        }
        let modal_label = modal_label(&label_counts);
        TickerStability {
          ticker: ticker.clone(),
          windows: history.len(),
          memberships: label_counts.len(),
          label_counts,
          modal_label,
        }
      })
      .collect()
  }
}

/// Most frequent label; ties resolve to the numerically lowest label.
fn modal_label(label_counts: &BTreeMap<usize, usize>) -> usize {
  let mut best_label = 0usize;
  let mut best_count = 0usize;
  for (label, count) in label_counts {
    // Strict inequality + ascending key order implements the tie-break.
    if *count > best_count {
      best_count = *count;
      best_label = *label;
    }
  }
  best_label
}

/// Membership summary for one ticker across its window history.
#[derive(Clone, Debug)]
pub struct TickerStability {
  pub ticker: String,
  /// Windows the ticker appeared in.
  pub windows: usize,
  /// Distinct cluster labels across those windows.
  pub memberships: usize,
  /// Occurrences per label.
  pub label_counts: BTreeMap<usize, usize>,
  /// Most frequent label, lowest label winning ties.
  pub modal_label: usize,
}

/// Full stability output.
#[derive(Clone, Debug)]
pub struct StabilityReport {
  /// Windows that produced an assignment, in chronological order.
  pub evaluated: Vec<AnalysisWindow>,
  /// Windows skipped because clustering could not proceed.
  pub skipped: Vec<(String, AnalysisError)>,
  pub history: WindowedClusterHistory,
  pub stats: Vec<TickerStability>,
}

/// Run the full pipeline per trailing window (in parallel) and aggregate
/// label history per ticker.
///
/// `reference` is the preprocessing state fitted on the reference
/// population; every window reuses it so components stay comparable.
pub fn analyze(
  series: &[TickerSeries],
  pipeline: &ClusterPipeline,
  window_config: &WindowConfig,
  reference: Option<&FittedPreprocess>,
) -> StabilityReport {
  let calendar = TradingCalendar::from_series(series);
  let windows = trailing_windows(&calendar, window_config);

  let runs: Vec<_> = windows
    .par_iter()
    .map(|window| {
      let run = pipeline.run(
        series,
        Some((window.from, window.to)),
        Some(window.label.clone()),
        reference,
      );
      (window.clone(), run)
    })
    .collect();

  let mut history = WindowedClusterHistory::default();
  let mut evaluated = Vec::new();
  let mut skipped = Vec::new();
  for (window, run) in runs {
    match run {
      Ok(run) => {
        history.absorb(
          &window.label,
          run.assignment.tickers(),
          run.assignment.labels(),
        );
        evaluated.push(window);
      }
      Err(err) => {
        warn!(window = %window.label, %err, "skipping window");
        skipped.push((window.label, err));
      }
    }
  }

  let stats = history.ticker_stats();
  StabilityReport {
    evaluated,
    skipped,
    history,
    stats,
  }
}
