//! # dgc-gravity
//!
//! Data gravitation classification on the host:
//! - [`normalization`]: training-set bounds and the in-place min-max transform
//! - [`classifier`]: weighted gravity, distance and classification
//! - [`evaluator`]: population fitness on a per-generation worker pool
//! - [`solution`]: best-candidate selection with the geometric-mean tie-break
//! - [`metrics`] / [`report`]: confusion matrix, AUC, weight and matrix rendering

pub mod classifier;
pub mod evaluator;
pub mod metrics;
pub mod normalization;
pub mod pool;
pub mod report;
pub mod solution;

pub use classifier::GravitationClassifier;
pub use evaluator::{check_metric, CpuEvaluator, DEFAULT_EVALUATION_TIMEOUT};
pub use metrics::ConfusionMatrix;
pub use normalization::NormalizationModel;
pub use report::{render_confusion_matrix, render_weights, ClassificationSummary};
pub use solution::{best_of, best_solution, normalized_geometric_mean, Solution};
