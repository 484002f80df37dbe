//! Trained model persistence.

use dgc_core::{Dataset, DgcError, FitnessMetric, Instance, Result};
use dgc_gravity::{ClassificationSummary, GravitationClassifier, NormalizationModel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::driver::TrainingOutcome;

/// Normalization model plus the winning weight vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    model: Arc<NormalizationModel>,
    weights: Vec<f64>,
    fitness: f64,
    metric: FitnessMetric,
}

impl TrainedModel {
    pub fn from_outcome(outcome: &TrainingOutcome, metric: FitnessMetric) -> Self {
        Self {
            model: outcome.classifier.model().clone(),
            weights: outcome.best.x.clone(),
            fitness: outcome.best.fitness,
            metric,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Training fitness of the stored weights
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn metric(&self) -> FitnessMetric {
        self.metric
    }

    pub fn normalization(&self) -> &NormalizationModel {
        &self.model
    }

    /// Rebuilds the classifier.
    pub fn classifier(&self) -> Result<GravitationClassifier> {
        GravitationClassifier::with_weights(self.model.clone(), self.weights.clone())
    }

    /// Classifies raw (unnormalized) attribute values.
    pub fn classify_raw(&self, values: &[f64]) -> Result<usize> {
        self.classifier()?.classify_raw(Instance::new(values.to_vec(), 0))
    }

    /// Predicts every instance of an already-normalized dataset.
    pub fn classify_dataset(&self, dataset: &Dataset) -> Result<Vec<usize>> {
        Ok(self.classifier()?.classify_dataset(dataset))
    }

    /// Scores the model on an already-normalized dataset.
    pub fn summary(&self, dataset: &Dataset) -> Result<ClassificationSummary> {
        ClassificationSummary::evaluate(&self.classifier()?, dataset)
    }

    pub fn render_weights(&self) -> String {
        dgc_gravity::render_weights(
            &self.weights,
            self.model.num_attributes(),
            self.model.num_classes(),
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a model and checks it before any classification can touch it.
    ///
    /// # Errors
    /// [`DgcError::SerializationError`] for malformed JSON or a stored
    /// training set that breaks the dataset invariants;
    /// [`DgcError::ValidationError`] for inconsistent normalization tables or
    /// a weight vector that is not `A * C` long.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if self.weights.len() != self.model.dimension() {
            return Err(DgcError::validation(format!(
                "stored weight vector has {} components, expected {}",
                self.weights.len(),
                self.model.dimension()
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Trained model written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}
