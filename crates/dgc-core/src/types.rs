//! Core data types for gravitation classification.
//!
//! Datasets arrive already decoded: every instance is a fixed-length vector of
//! numeric attribute values plus a dense, zero-based class label. Categorical
//! values are carried as category indices.

use serde::{Deserialize, Serialize};

use crate::errors::{DgcError, Result};

/// Kind of an input attribute.
///
/// Numerical and integer attributes are min-max normalized and compared with a
/// squared difference; categorical attributes keep their coded value and are
/// compared by overlap (0 when equal, 1 otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Numerical,
    Integer,
    Categorical,
}

impl AttributeKind {
    /// True for attributes that are scaled and compared by squared distance.
    pub fn is_numerical(self) -> bool {
        !matches!(self, AttributeKind::Categorical)
    }
}

/// Closed value interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the interval (`max - min`).
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Input attribute description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,

    /// Attribute kind
    pub kind: AttributeKind,

    /// Declared value interval. For categorical attributes this is the coded
    /// category interval `[0, categories - 1]`, kept for bookkeeping only.
    pub interval: Interval,

    /// Category labels (categorical attributes only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl Attribute {
    /// Creates a real-valued attribute.
    pub fn numerical(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Numerical,
            interval: Interval::new(min, max),
            categories: Vec::new(),
        }
    }

    /// Creates an integer-valued attribute.
    pub fn integer(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Integer,
            interval: Interval::new(min as f64, max as f64),
            categories: Vec::new(),
        }
    }

    /// Creates a categorical attribute whose values are category indices.
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        let categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        let upper = categories.len().saturating_sub(1) as f64;
        Self {
            name: name.into(),
            kind: AttributeKind::Categorical,
            interval: Interval::new(0.0, upper),
            categories,
        }
    }

    pub fn is_numerical(&self) -> bool {
        self.kind.is_numerical()
    }
}

/// Dataset metadata: input attributes plus the designated class attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Input attributes, in value-vector order (class attribute excluded)
    pub attributes: Vec<Attribute>,

    /// Class attribute name
    pub class_name: String,

    /// Class labels; label `k` of an instance indexes this list
    pub class_labels: Vec<String>,
}

impl Metadata {
    pub fn new<S: Into<String>>(
        attributes: Vec<Attribute>,
        class_name: impl Into<String>,
        class_labels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            attributes,
            class_name: class_name.into(),
            class_labels: class_labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of input attributes `A`.
    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Number of classes `C`.
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn attribute(&self, index: usize) -> &Attribute {
        &self.attributes[index]
    }
}

/// One labelled example.
///
/// The value vector is a boxed slice: its contents may be rewritten in place
/// (normalization) but its length is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    values: Box<[f64]>,
    label: usize,
}

impl Instance {
    pub fn new(values: impl Into<Vec<f64>>, label: usize) -> Self {
        Self {
            values: values.into().into_boxed_slice(),
            label,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn value(&self, attribute: usize) -> f64 {
        self.values[attribute]
    }

    /// Class label (dense, zero-based).
    pub fn label(&self) -> usize {
        self.label
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered collection of instances sharing one metadata description.
///
/// Deserialization goes through [`Dataset::new`], so stored datasets are
/// checked exactly like constructed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    metadata: Metadata,
    instances: Vec<Instance>,
}

impl Dataset {
    /// Creates a dataset, checking every instance against the metadata.
    ///
    /// # Errors
    /// Returns [`DgcError::ValidationError`] if an instance's value vector
    /// length differs from the attribute count or its label is not a valid
    /// class index.
    pub fn new(metadata: Metadata, instances: Vec<Instance>) -> Result<Self> {
        let num_attributes = metadata.num_attributes();
        let num_classes = metadata.num_classes();

        for (index, instance) in instances.iter().enumerate() {
            if instance.len() != num_attributes {
                return Err(DgcError::validation(format!(
                    "instance {} has {} values, expected {}",
                    index,
                    instance.len(),
                    num_attributes
                )));
            }
            if instance.label() >= num_classes {
                return Err(DgcError::validation(format!(
                    "instance {} has class label {} but only {} classes are declared",
                    index,
                    instance.label(),
                    num_classes
                )));
            }
        }

        Ok(Self {
            metadata,
            instances,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Mutable view over the instances; the collection itself cannot grow or shrink.
    pub fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn num_attributes(&self) -> usize {
        self.metadata.num_attributes()
    }

    pub fn num_classes(&self) -> usize {
        self.metadata.num_classes()
    }

    /// Number of instances per class label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for instance in &self.instances {
            counts[instance.label()] += 1;
        }
        counts
    }
}

#[derive(Deserialize)]
struct RawDataset {
    metadata: Metadata,
    instances: Vec<Instance>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = DgcError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        Dataset::new(raw.metadata, raw.instances)
    }
}

/// Fitness measure minimised by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    /// Misclassified fraction of the training set
    #[default]
    ErrorRate,

    /// `1 - AUC`, AUC from the 2x2 confusion matrix (binary problems only)
    Auc,
}

impl FitnessMetric {
    /// Checks that the metric is defined for `num_classes` classes.
    pub fn validate_classes(self, num_classes: usize) -> Result<()> {
        match self {
            FitnessMetric::Auc if num_classes != 2 => Err(DgcError::config(format!(
                "the AUC fitness metric requires exactly 2 classes, dataset has {}",
                num_classes
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata::new(
            vec![
                Attribute::numerical("x", 0.0, 10.0),
                Attribute::categorical("colour", ["red", "green", "blue"]),
            ],
            "class",
            ["a", "b"],
        )
    }

    #[test]
    fn test_categorical_interval_is_category_index_range() {
        let attr = Attribute::categorical("colour", ["red", "green", "blue"]);
        assert_eq!(attr.interval, Interval::new(0.0, 2.0));
        assert!(!attr.is_numerical());
        assert!(Attribute::integer("n", 1, 5).is_numerical());
    }

    #[test]
    fn test_dataset_rejects_wrong_length() {
        let result = Dataset::new(metadata(), vec![Instance::new(vec![1.0], 0)]);
        assert!(matches!(result, Err(DgcError::ValidationError(_))));
    }

    #[test]
    fn test_dataset_rejects_unknown_label() {
        let result = Dataset::new(metadata(), vec![Instance::new(vec![1.0, 2.0], 2)]);
        assert!(matches!(result, Err(DgcError::ValidationError(_))));
    }

    #[test]
    fn test_class_counts() {
        let dataset = Dataset::new(
            metadata(),
            vec![
                Instance::new(vec![1.0, 0.0], 0),
                Instance::new(vec![2.0, 1.0], 1),
                Instance::new(vec![3.0, 2.0], 1),
            ],
        )
        .unwrap();
        assert_eq!(dataset.class_counts(), vec![1, 2]);
    }

    #[test]
    fn test_deserialized_dataset_is_validated() {
        let dataset = Dataset::new(metadata(), vec![Instance::new(vec![1.0, 2.0], 1)]).unwrap();
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dataset);

        let truncated = json.replace("[1.0,2.0]", "[1.0]");
        assert_ne!(truncated, json);
        assert!(serde_json::from_str::<Dataset>(&truncated).is_err());

        let bad_label = json.replace("\"label\":1", "\"label\":7");
        assert_ne!(bad_label, json);
        assert!(serde_json::from_str::<Dataset>(&bad_label).is_err());
    }

    #[test]
    fn test_auc_metric_requires_binary() {
        assert!(FitnessMetric::Auc.validate_classes(2).is_ok());
        assert!(FitnessMetric::Auc.validate_classes(3).is_err());
        assert!(FitnessMetric::ErrorRate.validate_classes(5).is_ok());
    }
}
