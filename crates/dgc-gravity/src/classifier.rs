//! Gravitation classifier.
//!
//! A query instance is attracted by every training instance of a class with a
//! force inversely proportional to their (weighted) distance. The class with
//! the largest total attraction wins.
//!
//! ## Distance
//! ```text
//! d(a, b) = Σ_i w[label(b) * A + i] * δ_i(a, b)
//! δ_i = (a_i - b_i)^2            numerical / integer attributes
//! δ_i = 0 if a_i == b_i else 1   categorical attributes
//! ```
//! The weight row is selected by the label of the *training* instance `b`,
//! never by the query.
//!
//! ## Gravity
//! ```text
//! g(q, c) = (1 - (n_c - 1) / N) * Σ_{b in c, b ≠ q} 1 / d(q, b)
//! ```
//! A zero distance is an absorbing state: `g(q, c) = f64::MAX`.

use dgc_core::{Dataset, DgcError, Instance, Result};
use rayon::prelude::*;
use std::sync::Arc;

use crate::metrics::ConfusionMatrix;
use crate::normalization::NormalizationModel;
use crate::report;

/// Weighted data gravitation classifier bound to a normalization model.
///
/// Cloning deep-copies the weights and shares the (read-only) model.
#[derive(Debug, Clone)]
pub struct GravitationClassifier {
    model: Arc<NormalizationModel>,
    weights: Option<Vec<f64>>,
}

impl GravitationClassifier {
    /// Creates an unweighted classifier (every weight implicitly 1).
    pub fn new(model: Arc<NormalizationModel>) -> Self {
        Self {
            model,
            weights: None,
        }
    }

    /// Creates a classifier with a `A * C` weight vector.
    ///
    /// # Errors
    /// Returns [`DgcError::ValidationError`] if the vector length is not `A * C`.
    pub fn with_weights(model: Arc<NormalizationModel>, weights: Vec<f64>) -> Result<Self> {
        let mut classifier = Self::new(model);
        classifier.set_weights(weights)?;
        Ok(classifier)
    }

    pub fn set_weights(&mut self, weights: Vec<f64>) -> Result<()> {
        let expected = self.model.dimension();
        if weights.len() != expected {
            return Err(DgcError::validation(format!(
                "weight vector has {} components, expected {} (attributes x classes)",
                weights.len(),
                expected
            )));
        }
        self.weights = Some(weights);
        Ok(())
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn model(&self) -> &Arc<NormalizationModel> {
        &self.model
    }

    /// Predicts the class with maximum gravity; ties keep the lowest class index.
    pub fn classify(&self, instance: &Instance) -> usize {
        let mut max_gravity = -1.0;
        let mut max_class = 0;

        for class in 0..self.model.num_classes() {
            let gravity = self.gravity(instance, class);
            if gravity > max_gravity {
                max_gravity = gravity;
                max_class = class;
            }
        }

        max_class
    }

    /// Gravity of `instance` toward `class`.
    ///
    /// `instance` itself is skipped when it is one of the training instances
    /// (identity, not value equality).
    pub fn gravity(&self, instance: &Instance, class: usize) -> f64 {
        let training = self.model.training_set();
        let mut gravity = 0.0;

        for other in training.instances() {
            if other.label() != class || std::ptr::eq(other, instance) {
                continue;
            }
            let distance = self.distance(instance, other);
            if distance == 0.0 {
                return f64::MAX;
            }
            gravity += 1.0 / distance;
        }

        let share = (self.model.class_count(class) as f64 - 1.0) / training.len() as f64;
        gravity * (1.0 - share)
    }

    /// Weighted distance from `a` to the training instance `b`.
    pub fn distance(&self, a: &Instance, b: &Instance) -> f64 {
        let num_attributes = self.model.num_attributes();
        let mut distance = 0.0;

        match &self.weights {
            Some(weights) => {
                let row = &weights[b.label() * num_attributes..(b.label() + 1) * num_attributes];
                for i in 0..num_attributes {
                    distance += row[i] * self.attribute_distance(i, a.value(i), b.value(i));
                }
            }
            None => {
                for i in 0..num_attributes {
                    distance += self.attribute_distance(i, a.value(i), b.value(i));
                }
            }
        }

        distance
    }

    #[inline]
    fn attribute_distance(&self, attribute: usize, a: f64, b: f64) -> f64 {
        if self.model.is_numerical(attribute) {
            (b - a) * (b - a)
        } else if a == b {
            0.0
        } else {
            1.0
        }
    }

    /// Classifies every instance of `dataset` in parallel.
    ///
    /// The output is pre-sized; instance `i` writes only slot `i`.
    pub fn classify_dataset(&self, dataset: &Dataset) -> Vec<usize> {
        dataset
            .instances()
            .par_iter()
            .map(|instance| self.classify(instance))
            .collect()
    }

    /// Classifies the training set (each instance excluded from its own gravity).
    pub fn classify_training_set(&self) -> Vec<usize> {
        self.classify_dataset(self.model.training_set())
    }

    /// Normalizes a raw query with the training bounds and classifies it.
    pub fn classify_raw(&self, mut instance: Instance) -> Result<usize> {
        self.model.normalize_instance(&mut instance)?;
        Ok(self.classify(&instance))
    }

    /// Confusion matrix of this classifier on `dataset`.
    ///
    /// # Errors
    /// [`DgcError::ValidationError`] if `dataset` has a different attribute
    /// count or a label that is not a class of the training set.
    pub fn confusion_matrix(&self, dataset: &Dataset) -> Result<ConfusionMatrix> {
        if dataset.num_attributes() != self.model.num_attributes() {
            return Err(DgcError::validation(format!(
                "dataset has {} attributes, classifier expects {}",
                dataset.num_attributes(),
                self.model.num_attributes()
            )));
        }
        let predicted = self.classify_dataset(dataset);
        ConfusionMatrix::from_labels(
            self.model.num_classes(),
            dataset.instances().iter().map(Instance::label),
            &predicted,
        )
    }

    /// Weight matrix, one row per class, each cell divided by its row maximum.
    pub fn render_weights(&self) -> String {
        let uniform;
        let weights = match &self.weights {
            Some(weights) => weights.as_slice(),
            None => {
                uniform = vec![1.0; self.model.dimension()];
                uniform.as_slice()
            }
        };
        report::render_weights(
            weights,
            self.model.num_attributes(),
            self.model.num_classes(),
        )
    }
}
