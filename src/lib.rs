//! # equity-clusters-rs
//!
//! $$
//! \text{prices} \to z\text{-scores} \to \mathbf{f} \in \mathbb{R}^{22}
//! \to \mathrm{PCA} \to \text{clusters} \to (\text{stability},\ \text{performance})
//! $$
//!
//! Feature-based clustering and temporal-stability analysis of equity
//! price series. Daily adjusted closes become gap-filled, z-scored series
//! on a shared trading calendar; each series is summarized by 22 canonical
//! time-series descriptors; the population is standardized and projected
//! by PCA; and the resulting matrix is partitioned by seeded k-means, a
//! deterministic density-based hierarchy with an explicit noise label, or
//! k-medoids over dynamic-time-warping distances. Sliding-window reruns
//! measure membership stability, and per-cluster monthly returns are
//! compared against a benchmark through CAPM-style active premiums.
//!
//! Every stage consumes an immutable artifact and produces a new one;
//! identical inputs, parameters and seeds always reproduce identical
//! outputs.

pub mod cluster;
pub mod error;
pub mod features;
pub mod normalize;
pub mod performance;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod stability;
pub mod study;
pub mod types;
