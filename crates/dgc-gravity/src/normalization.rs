//! Normalization model: per-attribute bounds fitted once on the training set.
//!
//! Numerical and integer attributes are min-max scaled into `[0, 1]` with the
//! training bounds; categorical attributes keep their coded category index.
//! The same bounds are reapplied verbatim to test sets and ad-hoc queries.

use dgc_core::{Dataset, DgcError, Instance, Result};
use serde::{Deserialize, Serialize};

/// Training-set derived scaling bounds plus the normalized training set itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationModel {
    training_set: Dataset,
    fmin: Vec<f64>,
    fmax: Vec<f64>,
    numerical: Vec<bool>,
    class_counts: Vec<usize>,
}

impl NormalizationModel {
    /// Fits the bounds on `train_set`, normalizes it in place and applies the
    /// same transform to `test_set` if given.
    ///
    /// Numerical and integer bounds are the observed training minimum and
    /// maximum; categorical bounds are the declared category interval.
    ///
    /// # Errors
    /// Returns [`DgcError::ConfigError`] for an empty training set or a
    /// dataset without attributes or classes, and
    /// [`DgcError::ValidationError`] if the test set does not share the
    /// training attribute layout.
    pub fn prepare(mut train_set: Dataset, test_set: Option<&mut Dataset>) -> Result<Self> {
        let metadata = train_set.metadata();
        let num_attributes = metadata.num_attributes();
        let num_classes = metadata.num_classes();

        if num_attributes == 0 {
            return Err(DgcError::config("dataset declares no input attributes"));
        }
        if num_classes == 0 {
            return Err(DgcError::config("dataset declares no classes"));
        }
        if train_set.is_empty() {
            return Err(DgcError::config("training set is empty"));
        }

        let numerical: Vec<bool> = metadata
            .attributes
            .iter()
            .map(|attribute| attribute.is_numerical())
            .collect();

        let mut fmin = vec![f64::INFINITY; num_attributes];
        let mut fmax = vec![f64::NEG_INFINITY; num_attributes];
        for (i, attribute) in metadata.attributes.iter().enumerate() {
            if !numerical[i] {
                fmin[i] = attribute.interval.min;
                fmax[i] = attribute.interval.max;
            }
        }
        for instance in train_set.instances() {
            for (i, &value) in instance.values().iter().enumerate() {
                if numerical[i] {
                    fmin[i] = fmin[i].min(value);
                    fmax[i] = fmax[i].max(value);
                }
            }
        }

        let class_counts = train_set.class_counts();

        for i in 0..num_attributes {
            if numerical[i] && fmax[i] == fmin[i] {
                log::warn!(
                    "Attribute '{}' is constant on the training set; it normalizes to 0",
                    train_set.metadata().attribute(i).name
                );
            }
        }

        for instance in train_set.instances_mut() {
            scale_values(&fmin, &fmax, &numerical, instance.values_mut());
        }

        if let Some(test_set) = test_set {
            if test_set.num_attributes() != num_attributes {
                return Err(DgcError::validation(format!(
                    "test set has {} attributes, training set has {}",
                    test_set.num_attributes(),
                    num_attributes
                )));
            }
            if test_set.num_classes() != num_classes {
                return Err(DgcError::validation(format!(
                    "test set declares {} classes, training set has {}",
                    test_set.num_classes(),
                    num_classes
                )));
            }
            if let Some((index, instance)) = test_set
                .instances()
                .iter()
                .enumerate()
                .find(|(_, instance)| instance.label() >= num_classes)
            {
                return Err(DgcError::validation(format!(
                    "test instance {} has class label {} but the training set has {} classes",
                    index,
                    instance.label(),
                    num_classes
                )));
            }
            for instance in test_set.instances_mut() {
                scale_values(&fmin, &fmax, &numerical, instance.values_mut());
            }
        }

        log::info!(
            "Normalization model prepared: {} instances, {} attributes, {} classes",
            train_set.len(),
            num_attributes,
            num_classes
        );

        Ok(Self {
            training_set: train_set,
            fmin,
            fmax,
            numerical,
            class_counts,
        })
    }

    /// Checks the internal layout against the training metadata.
    ///
    /// [`prepare`](Self::prepare) always produces a consistent model; this is
    /// for models read back from storage.
    ///
    /// # Errors
    /// [`DgcError::ValidationError`] if a per-attribute table does not have
    /// one entry per attribute, an attribute kind flag disagrees with the
    /// metadata, or the class counts do not match the training set.
    pub fn validate(&self) -> Result<()> {
        let metadata = self.training_set.metadata();
        let num_attributes = metadata.num_attributes();
        let num_classes = metadata.num_classes();

        if num_attributes == 0 || num_classes == 0 || self.training_set.is_empty() {
            return Err(DgcError::validation(format!(
                "model training set is empty or degenerate: {} instances, {} attributes, {} classes",
                self.training_set.len(),
                num_attributes,
                num_classes
            )));
        }
        for (table, len) in [
            ("fmin", self.fmin.len()),
            ("fmax", self.fmax.len()),
            ("numerical", self.numerical.len()),
        ] {
            if len != num_attributes {
                return Err(DgcError::validation(format!(
                    "model {} table has {} entries, expected {}",
                    table, len, num_attributes
                )));
            }
        }
        if let Some(i) =
            (0..num_attributes).find(|&i| self.numerical[i] != metadata.attribute(i).is_numerical())
        {
            return Err(DgcError::validation(format!(
                "attribute '{}' kind flag disagrees with the metadata",
                metadata.attribute(i).name
            )));
        }
        if self.class_counts != self.training_set.class_counts() {
            return Err(DgcError::validation(format!(
                "model class counts {:?} do not match the training set {:?}",
                self.class_counts,
                self.training_set.class_counts()
            )));
        }
        Ok(())
    }

    /// Normalizes a newly arriving instance with the training bounds.
    ///
    /// # Errors
    /// Returns [`DgcError::ValidationError`] if the instance length differs
    /// from the attribute count.
    pub fn normalize_instance(&self, instance: &mut Instance) -> Result<()> {
        if instance.len() != self.num_attributes() {
            return Err(DgcError::validation(format!(
                "instance has {} values, expected {}",
                instance.len(),
                self.num_attributes()
            )));
        }
        self.apply(instance);
        Ok(())
    }

    /// Scales one raw attribute value.
    ///
    /// Constant attributes (`fmax == fmin`) map to 0 instead of dividing by zero.
    pub fn normalize_value(&self, attribute: usize, value: f64) -> f64 {
        scale_value(
            self.fmin[attribute],
            self.fmax[attribute],
            self.numerical[attribute],
            value,
        )
    }

    /// Inverse of [`normalize_value`](Self::normalize_value).
    pub fn denormalize_value(&self, attribute: usize, value: f64) -> f64 {
        if !self.numerical[attribute] {
            return value;
        }
        self.fmin[attribute] + value * self.range(attribute)
    }

    fn apply(&self, instance: &mut Instance) {
        scale_values(&self.fmin, &self.fmax, &self.numerical, instance.values_mut());
    }

    /// The normalized training set the classifier gravitates against.
    pub fn training_set(&self) -> &Dataset {
        &self.training_set
    }

    pub fn num_attributes(&self) -> usize {
        self.fmin.len()
    }

    pub fn num_classes(&self) -> usize {
        self.class_counts.len()
    }

    pub fn num_instances(&self) -> usize {
        self.training_set.len()
    }

    /// Weight-vector dimension `A * C`.
    pub fn dimension(&self) -> usize {
        self.num_attributes() * self.num_classes()
    }

    pub fn is_numerical(&self, attribute: usize) -> bool {
        self.numerical[attribute]
    }

    /// Training instances per class label.
    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    pub fn class_count(&self, class: usize) -> usize {
        self.class_counts[class]
    }

    pub fn fmin(&self, attribute: usize) -> f64 {
        self.fmin[attribute]
    }

    pub fn fmax(&self, attribute: usize) -> f64 {
        self.fmax[attribute]
    }

    pub fn range(&self, attribute: usize) -> f64 {
        self.fmax[attribute] - self.fmin[attribute]
    }
}

fn scale_value(fmin: f64, fmax: f64, numerical: bool, value: f64) -> f64 {
    if !numerical {
        return value;
    }
    let range = fmax - fmin;
    if range == 0.0 {
        0.0
    } else {
        (value - fmin) / range
    }
}

fn scale_values(fmin: &[f64], fmax: &[f64], numerical: &[bool], values: &mut [f64]) {
    for (i, value) in values.iter_mut().enumerate() {
        *value = scale_value(fmin[i], fmax[i], numerical[i], *value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dgc_core::{Attribute, Metadata};

    fn dataset(rows: &[(f64, f64, usize)]) -> Dataset {
        let metadata = Metadata::new(
            vec![
                Attribute::numerical("x", 0.0, 0.0),
                Attribute::categorical("kind", ["a", "b", "c"]),
            ],
            "class",
            ["neg", "pos"],
        );
        let instances = rows
            .iter()
            .map(|&(x, k, label)| Instance::new(vec![x, k], label))
            .collect();
        Dataset::new(metadata, instances).unwrap()
    }

    #[test]
    fn test_prepare_scales_numerical_and_keeps_categorical() {
        let train = dataset(&[(2.0, 0.0, 0), (4.0, 2.0, 1), (6.0, 1.0, 1)]);
        let model = NormalizationModel::prepare(train, None).unwrap();

        let values: Vec<Vec<f64>> = model
            .training_set()
            .instances()
            .iter()
            .map(|i| i.values().to_vec())
            .collect();
        assert_eq!(values, vec![vec![0.0, 0.0], vec![0.5, 2.0], vec![1.0, 1.0]]);
        assert_eq!(model.class_counts(), &[1, 2]);
        assert_eq!(model.fmin(1), 0.0);
        assert_eq!(model.fmax(1), 2.0);
        assert!(model.is_numerical(0));
        assert!(!model.is_numerical(1));
        assert_eq!(model.dimension(), 4);
    }

    #[test]
    fn test_test_set_uses_training_bounds() {
        let train = dataset(&[(0.0, 0.0, 0), (10.0, 1.0, 1)]);
        let mut test = dataset(&[(20.0, 1.0, 0), (5.0, 2.0, 1)]);
        let model = NormalizationModel::prepare(train, Some(&mut test)).unwrap();

        assert_relative_eq!(test.instances()[0].value(0), 2.0);
        assert_relative_eq!(test.instances()[1].value(0), 0.5);
        assert_eq!(model.fmax(0), 10.0);
    }

    #[test]
    fn test_test_set_with_extra_class_is_rejected() {
        let train = dataset(&[(0.0, 0.0, 0), (10.0, 1.0, 1)]);
        let metadata = Metadata::new(
            vec![
                Attribute::numerical("x", 0.0, 0.0),
                Attribute::categorical("kind", ["a", "b", "c"]),
            ],
            "class",
            ["neg", "pos", "other"],
        );
        let mut test = Dataset::new(metadata, vec![Instance::new(vec![5.0, 1.0], 2)]).unwrap();

        let result = NormalizationModel::prepare(train, Some(&mut test));
        assert!(matches!(result, Err(DgcError::ValidationError(_))));
    }

    #[test]
    fn test_validate_accepts_prepared_model_and_catches_bad_tables() {
        let model = NormalizationModel::prepare(dataset(&[(0.0, 0.0, 0), (1.0, 2.0, 1)]), None)
            .unwrap();
        assert!(model.validate().is_ok());

        let mut short = model.clone();
        short.fmax.pop();
        assert!(matches!(short.validate(), Err(DgcError::ValidationError(_))));

        let mut flipped = model.clone();
        flipped.numerical[1] = true;
        assert!(flipped.validate().is_err());

        let mut counts = model;
        counts.class_counts = vec![2];
        assert!(counts.validate().is_err());
    }

    #[test]
    fn test_constant_attribute_normalizes_to_zero() {
        let train = dataset(&[(3.0, 0.0, 0), (3.0, 1.0, 1)]);
        let model = NormalizationModel::prepare(train, None).unwrap();

        for instance in model.training_set().instances() {
            assert_eq!(instance.value(0), 0.0);
        }
        assert_eq!(model.normalize_value(0, 7.5), 0.0);
        assert!(!model.normalize_value(0, 3.0).is_nan());
    }

    #[test]
    fn test_normalize_instance_checks_length() {
        let model = NormalizationModel::prepare(dataset(&[(0.0, 0.0, 0), (1.0, 0.0, 1)]), None)
            .unwrap();
        let mut short = Instance::new(vec![0.5], 0);
        assert!(model.normalize_instance(&mut short).is_err());

        let mut query = Instance::new(vec![0.25, 2.0], 0);
        model.normalize_instance(&mut query).unwrap();
        assert_eq!(query.values(), &[0.25, 2.0]);
    }

    #[test]
    fn test_empty_training_set_is_config_error() {
        let train = dataset(&[]);
        let result = NormalizationModel::prepare(train, None);
        assert!(matches!(result, Err(DgcError::ConfigError(_))));
    }

    #[test]
    fn test_denormalize_round_trip() {
        let model = NormalizationModel::prepare(
            dataset(&[(-3.5, 0.0, 0), (12.25, 1.0, 1), (4.0, 2.0, 0)]),
            None,
        )
        .unwrap();
        for raw in [-3.5, -1.0, 0.0, 4.0, 7.3, 12.25] {
            let scaled = model.normalize_value(0, raw);
            assert_relative_eq!(model.denormalize_value(0, scaled), raw, epsilon = 1e-12);
        }
    }
}
