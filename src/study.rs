//! One-call study driver: reference clustering, windowed stability and
//! benchmark-relative performance in a single pass, the way an
//! exploratory session strings the stages together.

use anyhow::Context;
use anyhow::Result;
use tracing::info;

use crate::performance;
use crate::performance::PerformanceReport;
use crate::pipeline::ClusterPipeline;
use crate::pipeline::PipelineConfig;
use crate::pipeline::PipelineRun;
use crate::stability;
use crate::stability::StabilityReport;
use crate::stability::WindowConfig;
use crate::types::TickerSeries;
use crate::types::TradingCalendar;

/// Configuration for a full study.
#[derive(Clone, Debug)]
pub struct StudyConfig {
  pub pipeline: PipelineConfig,
  pub windows: WindowConfig,
}

/// Everything a full study produces.
#[derive(Clone, Debug)]
pub struct StudyOutput {
  /// Clustering of the full history.
  pub reference: PipelineRun,
  /// Sliding-window membership history and statistics.
  pub stability: StabilityReport,
  /// Benchmark-relative performance of the reference clusters.
  pub performance: PerformanceReport,
}

/// Run the whole study: fit the reference preprocessing, cluster the full
/// history, replay the pipeline per trailing window, and evaluate the
/// reference clusters against `benchmark` over the full span.
pub fn run_study(
  series: &[TickerSeries],
  benchmark: &TickerSeries,
  config: &StudyConfig,
) -> Result<StudyOutput> {
  let calendar = TradingCalendar::from_series(series);
  let (from, to) = calendar
    .span()
    .context("study requires at least one observed trading date")?;

  let pipeline = ClusterPipeline::new(config.pipeline.clone());
  let reference_fit = pipeline
    .fit_reference(series)
    .context("fitting reference preprocessing")?;
  let reference = pipeline
    .run(series, None, None, Some(&reference_fit))
    .context("clustering the full history")?;

  let stability = stability::analyze(series, &pipeline, &config.windows, Some(&reference_fit));
  let performance = performance::evaluate(
    &reference.assignment,
    series,
    benchmark,
    from,
    to,
    None,
  );

  info!(
    tickers = series.len(),
    clusters = reference.assignment.n_clusters(),
    windows = stability.evaluated.len(),
    "study complete"
  );
  Ok(StudyOutput {
    reference,
    stability,
    performance,
  })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::cluster::ClusterMode;
  use crate::cluster::kmeans::KMeansConfig;
  use crate::features::FeatureConfig;
  use crate::preprocess::PreprocessConfig;

  fn daily(ticker: &str, n: usize, f: impl Fn(usize) -> f64) -> TickerSeries {
    let start = NaiveDate::from_ymd_opt(2012, 1, 2).unwrap();
    let obs = (0..n)
      .map(|i| (start + chrono::Days::new(i as u64), f(i)))
      .collect();
    TickerSeries::new(ticker, obs).unwrap()
  }

  #[test]
  fn a_full_study_produces_all_three_outputs() {
    let n = 1500usize;
    let mut population = Vec::new();
    for t in 0..4 {
      population.push(daily(&format!("L{t}"), n, move |i| {
        100.0 + i as f64 * (0.04 + t as f64 * 0.01) + ((i * (t + 2)) as f64 * 0.9).sin() * 0.3
      }));
    }
    for t in 0..4 {
      population.push(daily(&format!("S{t}"), n, move |i| {
        100.0 + ((i as f64) * 0.1 + t as f64).sin() * 14.0 + ((i * (t + 7)) as f64 * 1.1).cos() * 0.4
      }));
    }
    let benchmark = daily("SPX", n, |i| 2000.0 + i as f64 * 0.5);

    let config = StudyConfig {
      pipeline: PipelineConfig {
        features: FeatureConfig::default(),
        preprocess: PreprocessConfig::default(),
        mode: ClusterMode::Centroid(KMeansConfig {
          k: 2,
          ..KMeansConfig::default()
        }),
      },
      windows: WindowConfig {
        window_years: 2,
        step_years: 1,
      },
    };
    let output = run_study(&population, &benchmark, &config).unwrap();

    assert_eq!(output.reference.assignment.len(), 8);
    assert!(output.reference.assignment.n_clusters() >= 2);
    assert!(!output.stability.evaluated.is_empty());
    assert_eq!(output.performance.per_ticker.len(), 8);
    assert!(!output.performance.per_cluster.is_empty());
  }
}
