//! Confusion matrix and the fitness measures derived from it.

use dgc_core::{DgcError, FitnessMetric, Result};
use serde::{Deserialize, Serialize};

/// `C x C` confusion matrix, rows = actual class, columns = predicted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    /// Builds the matrix from paired actual/predicted labels.
    ///
    /// # Errors
    /// [`DgcError::ValidationError`] if any label is not below `num_classes`.
    pub fn from_labels(
        num_classes: usize,
        actual: impl IntoIterator<Item = usize>,
        predicted: &[usize],
    ) -> Result<Self> {
        let mut matrix = Self::new(num_classes);
        for (truth, &guess) in actual.into_iter().zip(predicted) {
            matrix.record(truth, guess)?;
        }
        Ok(matrix)
    }

    /// Counts one classification.
    ///
    /// # Errors
    /// [`DgcError::ValidationError`] if either label is not below the class count.
    pub fn record(&mut self, actual: usize, predicted: usize) -> Result<()> {
        if actual >= self.num_classes || predicted >= self.num_classes {
            return Err(DgcError::validation(format!(
                "label pair ({}, {}) outside a {}-class confusion matrix",
                actual, predicted, self.num_classes
            )));
        }
        self.counts[actual * self.num_classes + predicted] += 1;
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.num_classes + predicted]
    }

    pub fn row(&self, actual: usize) -> &[usize] {
        let start = actual * self.num_classes;
        &self.counts[start..start + self.num_classes]
    }

    /// Instances whose actual class is `actual`.
    pub fn row_sum(&self, actual: usize) -> usize {
        self.row(actual).iter().sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Correctly classified instances (the trace).
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|c| self.get(c, c)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (total - self.correct()) as f64 / total as f64
    }

    /// True-positive rate of one class; `None` if the class has no instances.
    pub fn recall(&self, class: usize) -> Option<f64> {
        let support = self.row_sum(class);
        if support == 0 {
            None
        } else {
            Some(self.get(class, class) as f64 / support as f64)
        }
    }

    /// Geometric mean of the per-class recalls over the classes present.
    pub fn geometric_mean(&self) -> f64 {
        let recalls: Vec<f64> = (0..self.num_classes).filter_map(|c| self.recall(c)).collect();
        if recalls.is_empty() {
            return 0.0;
        }
        recalls
            .iter()
            .product::<f64>()
            .powf(1.0 / recalls.len() as f64)
    }

    /// `(sensitivity + specificity) / 2` with class 0 as the positive class.
    ///
    /// # Errors
    /// [`DgcError::ConfigError`] unless the matrix is 2x2, and
    /// [`DgcError::NumericalError`] if either class has no instances.
    pub fn auc(&self) -> Result<f64> {
        if self.num_classes != 2 {
            return Err(DgcError::config(format!(
                "AUC is defined for 2 classes, confusion matrix has {}",
                self.num_classes
            )));
        }
        let sensitivity = self
            .recall(0)
            .ok_or_else(|| DgcError::numerical("AUC undefined: class 0 has no instances"))?;
        let specificity = self
            .recall(1)
            .ok_or_else(|| DgcError::numerical("AUC undefined: class 1 has no instances"))?;
        Ok((sensitivity + specificity) / 2.0)
    }

    /// Fitness (lower is better) of this matrix under `metric`.
    pub fn fitness(&self, metric: FitnessMetric) -> Result<f64> {
        match metric {
            FitnessMetric::ErrorRate => Ok(self.error_rate()),
            FitnessMetric::Auc => Ok(1.0 - self.auc()?),
        }
    }

    /// Row-major copy, `rows[actual][predicted]`.
    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        (0..self.num_classes).map(|c| self.row(c).to_vec()).collect()
    }
}
