//! Human-readable rendering and classification summaries.

use dgc_core::{Dataset, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::classifier::GravitationClassifier;
use crate::metrics::ConfusionMatrix;

/// Renders a `C x A` weight matrix, one line per class, each weight divided by
/// the maximum of its row and printed with 4 decimals.
pub fn render_weights(weights: &[f64], num_attributes: usize, num_classes: usize) -> String {
    let mut out = String::from("Class \\ Attribute matrix of weights\n");

    for class in 0..num_classes {
        let row = &weights[class * num_attributes..(class + 1) * num_attributes];
        let max = row.iter().fold(0.0_f64, |acc, &w| acc.max(w));
        let cells: Vec<String> = row
            .iter()
            .map(|&w| {
                let value = if max > 0.0 { w / max } else { 0.0 };
                format!("{:.4}", value)
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join(" "));
    }

    out
}

/// Renders a confusion matrix with right-aligned columns, rows = actual class.
pub fn render_confusion_matrix(matrix: &ConfusionMatrix, labels: &[String]) -> String {
    let n = matrix.num_classes();
    let label = |c: usize| labels.get(c).cloned().unwrap_or_else(|| c.to_string());

    let mut width = (0..n).map(|c| label(c).len()).max().unwrap_or(1);
    for actual in 0..n {
        for &count in matrix.row(actual) {
            width = width.max(count.to_string().len());
        }
    }

    let mut out = String::new();
    let _ = write!(out, "{:>width$}", "", width = width);
    for c in 0..n {
        let _ = write!(out, " {:>width$}", label(c), width = width);
    }
    out.push_str("  <- predicted\n");

    for actual in 0..n {
        let _ = write!(out, "{:>width$}", label(actual), width = width);
        for &count in matrix.row(actual) {
            let _ = write!(out, " {:>width$}", count, width = width);
        }
        out.push('\n');
    }

    out
}

/// Scores of one classifier on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub instances: usize,
    pub accuracy: f64,
    pub error_rate: f64,

    /// Present for binary problems with both classes represented
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auc: Option<f64>,

    /// Geometric mean of the per-class recalls
    pub geometric_mean: f64,

    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationSummary {
    pub fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        Self {
            instances: matrix.total(),
            accuracy: matrix.accuracy(),
            error_rate: matrix.error_rate(),
            auc: matrix.auc().ok(),
            geometric_mean: matrix.geometric_mean(),
            confusion_matrix: matrix.to_rows(),
        }
    }

    /// Classifies `dataset` and summarizes the outcome.
    pub fn evaluate(classifier: &GravitationClassifier, dataset: &Dataset) -> Result<Self> {
        Ok(Self::from_matrix(&classifier.confusion_matrix(dataset)?))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
