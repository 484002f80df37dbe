//! CPU fitness evaluator.
//!
//! One candidate weight vector per task: build a classifier with those
//! weights, classify the whole training set and reduce the predictions to a
//! fitness value (error rate, or `1 - AUC` for binary problems).

use dgc_core::{DgcError, FitnessEvaluator, FitnessMetric, Instance, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::GravitationClassifier;
use crate::metrics::ConfusionMatrix;
use crate::normalization::NormalizationModel;
use crate::pool;

/// Practically unbounded wait for one generation (30 days).
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Multi-threaded evaluator that scores candidates on the host.
#[derive(Debug, Clone)]
pub struct CpuEvaluator {
    model: Arc<NormalizationModel>,
    metric: FitnessMetric,
    worker_threads: usize,
    timeout: Duration,
}

impl CpuEvaluator {
    /// Creates an evaluator over a prepared model.
    ///
    /// # Errors
    /// [`DgcError::ConfigError`] if `metric` is [`FitnessMetric::Auc`] and the
    /// training set is not a binary problem with both classes present.
    pub fn new(model: Arc<NormalizationModel>, metric: FitnessMetric) -> Result<Self> {
        check_metric(&model, metric)?;
        Ok(Self {
            model,
            metric,
            worker_threads: pool::default_worker_threads(),
            timeout: DEFAULT_EVALUATION_TIMEOUT,
        })
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn metric(&self) -> FitnessMetric {
        self.metric
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn model(&self) -> &Arc<NormalizationModel> {
        &self.model
    }

    /// Scores one candidate on the calling thread.
    pub fn score(&self, x: &[f64]) -> Result<f64> {
        let classifier = GravitationClassifier::with_weights(self.model.clone(), x.to_vec())?;
        let training = self.model.training_set();

        match self.metric {
            FitnessMetric::ErrorRate => {
                let misclassified = training
                    .instances()
                    .iter()
                    .filter(|instance| classifier.classify(instance) != instance.label())
                    .count();
                Ok(misclassified as f64 / training.len() as f64)
            }
            FitnessMetric::Auc => {
                let predicted: Vec<usize> = training
                    .instances()
                    .iter()
                    .map(|instance| classifier.classify(instance))
                    .collect();
                let matrix = ConfusionMatrix::from_labels(
                    self.model.num_classes(),
                    training.instances().iter().map(Instance::label),
                    &predicted,
                )?;
                matrix.fitness(FitnessMetric::Auc)
            }
        }
    }
}

/// Rejects metric/dataset combinations the metric is undefined for.
pub fn check_metric(model: &NormalizationModel, metric: FitnessMetric) -> Result<()> {
    metric.validate_classes(model.num_classes())?;
    if metric == FitnessMetric::Auc {
        if let Some(class) = model.class_counts().iter().position(|&count| count == 0) {
            return Err(DgcError::config(format!(
                "the AUC fitness metric needs instances of both classes; class {} is empty",
                class
            )));
        }
    }
    Ok(())
}

impl FitnessEvaluator for CpuEvaluator {
    fn values_of(&self, population: &[Vec<f64>]) -> Result<Vec<f64>> {
        log::debug!(
            "Scoring {} candidates on {} CPU workers",
            population.len(),
            self.worker_threads
        );
        pool::run_slots(population.len(), self.worker_threads, self.timeout, |index| {
            self.score(&population[index])
        })
    }

    fn value_of(&self, x: &[f64]) -> Result<f64> {
        self.score(x)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgc_core::{Attribute, Dataset, Metadata};

    fn model(labels: &[&str], rows: &[(f64, usize)]) -> Arc<NormalizationModel> {
        let metadata = Metadata::new(vec![Attribute::numerical("x", 0.0, 1.0)], "class", labels.to_vec());
        let instances = rows.iter().map(|&(x, c)| Instance::new(vec![x], c)).collect();
        Arc::new(NormalizationModel::prepare(Dataset::new(metadata, instances).unwrap(), None).unwrap())
    }

    #[test]
    fn test_separable_data_scores_zero_error() {
        let model = model(&["a", "b"], &[(0.0, 0), (0.1, 0), (0.9, 1), (1.0, 1)]);
        let evaluator = CpuEvaluator::new(model, FitnessMetric::ErrorRate).unwrap();
        assert_eq!(evaluator.value_of(&[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_rejected_for_multiclass() {
        let model = model(&["a", "b", "c"], &[(0.0, 0), (0.5, 1), (1.0, 2)]);
        let result = CpuEvaluator::new(model, FitnessMetric::Auc);
        assert!(matches!(result, Err(DgcError::ConfigError(_))));
    }

    #[test]
    fn test_auc_rejected_with_empty_class() {
        let model = model(&["a", "b"], &[(0.0, 0), (1.0, 0)]);
        assert!(CpuEvaluator::new(model, FitnessMetric::Auc).is_err());
    }

    #[test]
    fn test_wrong_dimension_fails_whole_population() {
        let model = model(&["a", "b"], &[(0.0, 0), (1.0, 1)]);
        let evaluator = CpuEvaluator::new(model, FitnessMetric::ErrorRate)
            .unwrap()
            .with_worker_threads(2);
        let population = vec![vec![1.0, 1.0], vec![1.0]];
        assert!(matches!(
            evaluator.values_of(&population),
            Err(DgcError::ValidationError(_))
        ));
    }
}
