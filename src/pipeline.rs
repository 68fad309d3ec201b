//! # Pipeline
//!
//! Orchestrates one full pass for a date range: shared calendar →
//! standardization → feature extraction → fitted preprocessing → cluster
//! assignment. The temporal-stability analyzer repeats this unit per
//! sliding window; everything here is a pure function of its inputs plus
//! the configured seed.

use chrono::NaiveDate;
use tracing::info;

use crate::cluster;
use crate::cluster::ClusterAssignment;
use crate::cluster::ClusterMode;
use crate::cluster::dtw;
use crate::error::AnalysisError;
use crate::features;
use crate::features::FeatureConfig;
use crate::normalize;
use crate::preprocess::FittedPreprocess;
use crate::preprocess::PreprocessConfig;
use crate::types::TickerSeries;
use crate::types::TradingCalendar;

/// End-to-end configuration for one clustering pass.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
  pub features: FeatureConfig,
  pub preprocess: PreprocessConfig,
  pub mode: ClusterMode,
}

/// Output of one pass: the assignment, every stage-local exclusion, and
/// the preprocessing state that produced the clustered matrix.
#[derive(Clone, Debug)]
pub struct PipelineRun {
  pub window_label: Option<String>,
  pub assignment: ClusterAssignment,
  pub excluded: Vec<(String, AnalysisError)>,
  /// Fitted preprocessing used by the feature-space modes; `None` for the
  /// DTW mode, which clusters series directly.
  pub fitted: Option<FittedPreprocess>,
}

/// The full analytical pass from raw series to a cluster assignment.
#[derive(Clone, Debug)]
pub struct ClusterPipeline {
  config: PipelineConfig,
}

impl ClusterPipeline {
  pub fn new(config: PipelineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Fit the population-level preprocessing on the full history so that
  /// windowed sub-analyses can reuse one reference basis.
  pub fn fit_reference(&self, series: &[TickerSeries]) -> Result<FittedPreprocess, AnalysisError> {
    let calendar = TradingCalendar::from_series(series);
    let (standardized, _) = normalize::standardize_all(series, &calendar);
    let (table, _) = features::extract_table(&standardized, &self.config.features);
    FittedPreprocess::fit(&table, &self.config.preprocess)
  }

  /// Run the pipeline over `[from, to]` (or the full span when `None`),
  /// reusing `reference` preprocessing when provided.
  pub fn run(
    &self,
    series: &[TickerSeries],
    range: Option<(NaiveDate, NaiveDate)>,
    window_label: Option<String>,
    reference: Option<&FittedPreprocess>,
  ) -> Result<PipelineRun, AnalysisError> {
    let restricted: Vec<TickerSeries> = match range {
      Some((from, to)) => series
        .iter()
        .map(|s| s.restrict(from, to))
        .filter(|s| !s.is_empty())
        .collect(),
      None => series.to_vec(),
    };

    let calendar = TradingCalendar::from_series(&restricted);
    let (standardized, mut excluded) = normalize::standardize_all(&restricted, &calendar);

    let run = match &self.config.mode {
      ClusterMode::Dtw(dtw_config) => {
        // The DTW mode compares standardized series shapes directly and
        // bypasses the feature stages.
        let min_len = self.config.features.min_len;
        let mut tickers = Vec::new();
        let mut kept: Vec<&[f64]> = Vec::new();
        for s in &standardized {
          if s.n_observations() < min_len {
            excluded.push((
              s.ticker().to_string(),
              AnalysisError::InsufficientData {
                ticker: s.ticker().to_string(),
                len: s.n_observations(),
                min_len,
              },
            ));
          } else {
            tickers.push(s.ticker().to_string());
            kept.push(s.observed());
          }
        }
        let dist = dtw::distance_matrix(&kept, dtw_config.band);
        let fit = dtw::fit_medoids(&dist, dtw_config)?;
        let labels = fit.labels.iter().map(|l| l + 1).collect();
        PipelineRun {
          window_label,
          assignment: ClusterAssignment::new(tickers, labels),
          excluded,
          fitted: None,
        }
      }
      mode => {
        let (table, feature_excluded) =
          features::extract_table(&standardized, &self.config.features);
        excluded.extend(feature_excluded);

        let fitted = match reference {
          Some(f) => f.clone(),
          None => FittedPreprocess::fit(&table, &self.config.preprocess)?,
        };
        let matrix = fitted.transform(&table);
        let assignment = cluster::cluster_rows(table.tickers(), &matrix, mode)?;
        PipelineRun {
          window_label,
          assignment,
          excluded,
          fitted: Some(fitted),
        }
      }
    };

    info!(
      window = run.window_label.as_deref().unwrap_or("full history"),
      population = run.assignment.len(),
      clusters = run.assignment.n_clusters(),
      noise = run.assignment.noise_count(),
      excluded = run.excluded.len(),
      "pipeline pass complete"
    );
    Ok(run)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use ndarray::Array1;
  use ndarray_rand::RandomExt;
  use ndarray_rand::rand_distr::Normal;
  use rand::SeedableRng;
  use rand::rngs::StdRng;

  use super::*;
  use crate::cluster::density::DensityConfig;
  use crate::cluster::dtw::DtwConfig;
  use crate::cluster::kmeans::KMeansConfig;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  /// Ten fabricated tickers over 500 days: five trending linear shapes
  /// and five sinusoidal shapes, with seeded per-ticker noise.
  fn two_family_population() -> Vec<TickerSeries> {
    let start = d(2018, 1, 1);
    let n = 500usize;
    let mut population = Vec::new();

    for t in 0..10 {
      let sinusoidal = t >= 5;
      let mut rng = StdRng::seed_from_u64(900 + t as u64);
      let noise = Array1::random_using(n, Normal::new(0.0, 0.3).unwrap(), &mut rng);
      let obs: Vec<(NaiveDate, f64)> = (0..n)
        .map(|i| {
          let base = if sinusoidal {
            100.0 + (i as f64 * 0.12 + t as f64).sin() * 12.0
          } else {
            100.0 + i as f64 * (0.05 + t as f64 * 0.01)
          };
          (start + chrono::Days::new(i as u64), base + noise[i])
        })
        .collect();
      population.push(TickerSeries::new(format!("T{t:02}"), obs).unwrap());
    }
    population
  }

  fn pipeline_with(mode: ClusterMode) -> ClusterPipeline {
    ClusterPipeline::new(PipelineConfig {
      features: FeatureConfig::default(),
      preprocess: PreprocessConfig::default(),
      mode,
    })
  }

  fn family_labels(run: &PipelineRun) -> (Vec<usize>, Vec<usize>) {
    let linear: Vec<usize> = (0..5)
      .filter_map(|t| run.assignment.label_of(&format!("T{t:02}")))
      .collect();
    let sinusoidal: Vec<usize> = (5..10)
      .filter_map(|t| run.assignment.label_of(&format!("T{t:02}")))
      .collect();
    (linear, sinusoidal)
  }

  #[test]
  fn centroid_mode_separates_shape_families_end_to_end() {
    let population = two_family_population();
    let pipeline = pipeline_with(ClusterMode::Centroid(KMeansConfig {
      k: 2,
      ..KMeansConfig::default()
    }));
    let run = pipeline.run(&population, None, None, None).unwrap();

    assert!(run.excluded.is_empty());
    assert!(run.assignment.n_clusters() >= 2);
    let (linear, sinusoidal) = family_labels(&run);
    assert!(linear.iter().all(|l| *l == linear[0]));
    assert!(sinusoidal.iter().all(|l| *l == sinusoidal[0]));
    assert_ne!(linear[0], sinusoidal[0]);
  }

  #[test]
  fn density_mode_separates_shape_families_end_to_end() {
    let population = two_family_population();
    let pipeline = pipeline_with(ClusterMode::Density(DensityConfig {
      min_cluster_size: 3,
      min_samples: None,
    }));
    let run = pipeline.run(&population, None, None, None).unwrap();

    assert!(run.assignment.n_clusters() >= 2);
    let (linear, sinusoidal) = family_labels(&run);
    let linear_non_noise: Vec<usize> =
      linear.iter().copied().filter(|l| *l != 0).collect();
    let sinusoidal_non_noise: Vec<usize> =
      sinusoidal.iter().copied().filter(|l| *l != 0).collect();
    assert!(linear_non_noise.len() >= 3);
    assert!(sinusoidal_non_noise.len() >= 3);
    assert!(
      linear_non_noise
        .iter()
        .all(|l| !sinusoidal_non_noise.contains(l)),
      "families share a cluster: {linear_non_noise:?} vs {sinusoidal_non_noise:?}"
    );
  }

  #[test]
  fn dtw_mode_clusters_series_shapes() {
    let population = two_family_population();
    let pipeline = pipeline_with(ClusterMode::Dtw(DtwConfig {
      k: 2,
      band: Some(20),
      ..DtwConfig::default()
    }));
    let run = pipeline.run(&population, None, None, None).unwrap();

    assert!(run.fitted.is_none());
    assert_eq!(run.assignment.len(), 10);
    let (linear, sinusoidal) = family_labels(&run);
    assert!(linear.iter().all(|l| *l == linear[0]));
    assert!(sinusoidal.iter().all(|l| *l == sinusoidal[0]));
    assert_ne!(linear[0], sinusoidal[0]);
  }

  #[test]
  fn degenerate_and_short_series_are_excluded_not_fatal() {
    let mut population = two_family_population();
    let start = d(2018, 1, 1);
    population.push(
      TickerSeries::new(
        "FLAT",
        (0..500)
          .map(|i| (start + chrono::Days::new(i as u64), 50.0))
          .collect::<Vec<_>>(),
      )
      .unwrap(),
    );
    population.push(
      TickerSeries::new(
        "SHRT",
        (0..20)
          .map(|i| (start + chrono::Days::new(i as u64), 50.0 + i as f64))
          .collect::<Vec<_>>(),
      )
      .unwrap(),
    );

    let pipeline = pipeline_with(ClusterMode::Centroid(KMeansConfig {
      k: 2,
      ..KMeansConfig::default()
    }));
    let run = pipeline.run(&population, None, None, None).unwrap();

    assert_eq!(run.assignment.len(), 10);
    assert_eq!(run.excluded.len(), 2);
    assert!(run.excluded.iter().any(|(t, e)| {
      t == "FLAT" && matches!(e, AnalysisError::DegenerateSeries { .. })
    }));
    assert!(run.excluded.iter().any(|(t, e)| {
      t == "SHRT" && matches!(e, AnalysisError::InsufficientData { .. })
    }));
  }

  #[test]
  fn reference_preprocessing_is_reused_not_refit() {
    let population = two_family_population();
    let pipeline = pipeline_with(ClusterMode::Centroid(KMeansConfig {
      k: 2,
      ..KMeansConfig::default()
    }));
    let reference = pipeline.fit_reference(&population).unwrap();
    let retained = reference.pca().map(|p| p.retained());

    let run = pipeline
      .run(
        &population,
        Some((d(2018, 6, 1), d(2019, 3, 1))),
        Some("2018-2019".to_string()),
        Some(&reference),
      )
      .unwrap();
    assert_eq!(run.window_label.as_deref(), Some("2018-2019"));
    assert_eq!(run.fitted.as_ref().and_then(|f| f.pca().map(|p| p.retained())), retained);
  }
}
