//! Accelerator context: device buffers and worker units for one run.
//!
//! ASSUMPTIONS:
//! - Training data is uploaded once per run, attribute-major, each attribute
//!   row padded to a multiple of `ALIGNMENT` elements
//! - The population buffer is sized once (`capacity * A * C`) and never grows
//! - Worker units are a fixed-size pool owned by the context
//!
//! LIFECYCLE:
//! - `prepare` allocates (capacity, worker units, A, N, C)
//! - `upload` copies the normalized training set through [`TrainingAccess`]
//! - `evaluate` scores one population per generation
//! - `release` frees everything exactly once; dropping an unreleased context
//!   releases it with a warning

use dgc_core::{DgcError, FitnessMetric, Result};
use dgc_gravity::NormalizationModel;
use serde::{Deserialize, Serialize};

use crate::kernel;

/// Upper bound on worker units per context
pub const MAX_WORKER_UNITS: usize = 16;

/// Padding granularity of the per-attribute instance rows (elements)
pub const ALIGNMENT: usize = 256;

/// Candidates scored per block
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// Accelerator settings (`[accelerator]` table of the run configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// Parallel worker units, `1..=MAX_WORKER_UNITS`
    pub worker_units: usize,

    /// Candidates per scheduling block
    pub block_size: usize,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            worker_units: 1,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl AcceleratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_units == 0 || self.worker_units > MAX_WORKER_UNITS {
            return Err(DgcError::accelerator(
                "config",
                format!(
                    "worker_units must be in 1..={}, got {}",
                    MAX_WORKER_UNITS, self.worker_units
                ),
            ));
        }
        if self.block_size == 0 {
            return Err(DgcError::config("accelerator block_size must be positive"));
        }
        Ok(())
    }
}

/// Read accessors the context uses to copy a training set.
///
/// Values are expected already normalized.
pub trait TrainingAccess {
    fn num_instances(&self) -> usize;
    fn num_attributes(&self) -> usize;
    fn num_classes(&self) -> usize;

    /// Attribute `attribute` of instance `instance`
    fn value(&self, instance: usize, attribute: usize) -> f64;

    /// Class label of instance `instance`
    fn class_value(&self, instance: usize) -> usize;

    /// Training instances with label `class`
    fn class_count(&self, class: usize) -> usize;

    fn is_numerical(&self, attribute: usize) -> bool;
}

impl TrainingAccess for NormalizationModel {
    fn num_instances(&self) -> usize {
        NormalizationModel::num_instances(self)
    }

    fn num_attributes(&self) -> usize {
        NormalizationModel::num_attributes(self)
    }

    fn num_classes(&self) -> usize {
        NormalizationModel::num_classes(self)
    }

    fn value(&self, instance: usize, attribute: usize) -> f64 {
        self.training_set().instances()[instance].value(attribute)
    }

    fn class_value(&self, instance: usize) -> usize {
        self.training_set().instances()[instance].label()
    }

    fn class_count(&self, class: usize) -> usize {
        NormalizationModel::class_count(self, class)
    }

    fn is_numerical(&self, attribute: usize) -> bool {
        NormalizationModel::is_numerical(self, attribute)
    }
}

/// Host-side mirror of the device allocations.
#[derive(Debug)]
pub(crate) struct DeviceBuffers {
    /// `values[a * stride + i]`
    pub values: Vec<f64>,
    pub labels: Vec<usize>,
    pub class_counts: Vec<usize>,
    pub numerical: Vec<bool>,
    pub stride: usize,

    /// `population[k * dimension + j]`
    pub population: Vec<f64>,
    pub fitness: Vec<f64>,
    pub uploaded: bool,
}

/// Shape of a prepared context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextShape {
    pub capacity: usize,
    pub num_attributes: usize,
    pub num_instances: usize,
    pub num_classes: usize,
}

impl ContextShape {
    /// Weight-vector dimension `A * C`
    pub fn dimension(&self) -> usize {
        self.num_attributes * self.num_classes
    }
}

/// Scoped accelerator resources for one classification run.
pub struct AcceleratorContext {
    shape: ContextShape,
    worker_units: usize,
    block_size: usize,
    buffers: Option<DeviceBuffers>,
    workers: Option<rayon::ThreadPool>,
}

impl AcceleratorContext {
    /// Allocates buffers and worker units.
    ///
    /// # Errors
    /// [`DgcError::AcceleratorError`] if the worker-unit count is out of range
    /// or the worker units cannot be started; [`DgcError::ConfigError`] for a
    /// zero capacity, attribute, instance or class count.
    pub fn prepare(shape: ContextShape, config: &AcceleratorConfig) -> Result<Self> {
        config.validate()?;
        if shape.capacity == 0
            || shape.num_attributes == 0
            || shape.num_instances == 0
            || shape.num_classes == 0
        {
            return Err(DgcError::config(format!(
                "accelerator shape must be non-empty: {:?}",
                shape
            )));
        }

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_units)
            .thread_name(|i| format!("dgc-accel-{}", i))
            .build()
            .map_err(|e| DgcError::accelerator("prepare", e.to_string()))?;

        let stride = shape.num_instances.div_ceil(ALIGNMENT) * ALIGNMENT;
        let dimension = shape.dimension();
        let buffers = DeviceBuffers {
            values: vec![0.0; shape.num_attributes * stride],
            labels: vec![0; shape.num_instances],
            class_counts: vec![0; shape.num_classes],
            numerical: vec![false; shape.num_attributes],
            stride,
            population: vec![0.0; shape.capacity * dimension],
            fitness: vec![0.0; shape.capacity],
            uploaded: false,
        };

        log::info!(
            "Accelerator prepared: capacity={}, worker_units={}, A={}, N={}, C={}, stride={}",
            shape.capacity,
            config.worker_units,
            shape.num_attributes,
            shape.num_instances,
            shape.num_classes,
            stride
        );

        Ok(Self {
            shape,
            worker_units: config.worker_units,
            block_size: config.block_size,
            buffers: Some(buffers),
            workers: Some(workers),
        })
    }

    pub fn shape(&self) -> ContextShape {
        self.shape
    }

    pub fn worker_units(&self) -> usize {
        self.worker_units
    }

    pub fn is_released(&self) -> bool {
        self.buffers.is_none()
    }

    fn buffers_mut(&mut self, operation: &str) -> Result<&mut DeviceBuffers> {
        self.buffers
            .as_mut()
            .ok_or_else(|| DgcError::accelerator(operation, "context already released"))
    }

    /// Copies the training set into the device buffers.
    ///
    /// # Errors
    /// [`DgcError::ValidationError`] if the data does not match the prepared shape.
    pub fn upload<T: TrainingAccess + ?Sized>(&mut self, data: &T) -> Result<()> {
        let shape = self.shape;
        if data.num_attributes() != shape.num_attributes
            || data.num_instances() != shape.num_instances
            || data.num_classes() != shape.num_classes
        {
            return Err(DgcError::validation(format!(
                "training data is {}x{} with {} classes, context was prepared for {}x{} with {} classes",
                data.num_instances(),
                data.num_attributes(),
                data.num_classes(),
                shape.num_instances,
                shape.num_attributes,
                shape.num_classes
            )));
        }

        let buffers = self.buffers_mut("upload")?;
        let stride = buffers.stride;
        for a in 0..shape.num_attributes {
            buffers.numerical[a] = data.is_numerical(a);
            for i in 0..shape.num_instances {
                buffers.values[a * stride + i] = data.value(i, a);
            }
        }
        for i in 0..shape.num_instances {
            buffers.labels[i] = data.class_value(i);
        }
        for c in 0..shape.num_classes {
            buffers.class_counts[c] = data.class_count(c);
        }
        buffers.uploaded = true;

        log::debug!("Uploaded {} training instances", shape.num_instances);
        Ok(())
    }

    /// Scores `population` and returns the fitness slots in candidate order.
    ///
    /// # Errors
    /// [`DgcError::ResourceExhausted`] if the population exceeds the prepared
    /// capacity, [`DgcError::ValidationError`] for a candidate of the wrong
    /// dimension, [`DgcError::AcceleratorError`] before `upload` or after
    /// `release`.
    pub fn evaluate(&mut self, population: &[Vec<f64>], metric: FitnessMetric) -> Result<&[f64]> {
        let shape = self.shape;
        let dimension = shape.dimension();
        let block_size = self.block_size;

        if population.len() > shape.capacity {
            return Err(DgcError::resource_exhausted(format!(
                "population of {} exceeds accelerator capacity {}",
                population.len(),
                shape.capacity
            )));
        }
        if let Some((k, x)) = population.iter().enumerate().find(|(_, x)| x.len() != dimension) {
            return Err(DgcError::validation(format!(
                "candidate {} has {} components, expected {}",
                k,
                x.len(),
                dimension
            )));
        }

        let workers = self
            .workers
            .as_ref()
            .ok_or_else(|| DgcError::accelerator("evaluate", "context already released"))?;
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| DgcError::accelerator("evaluate", "context already released"))?;
        if !buffers.uploaded {
            return Err(DgcError::accelerator("evaluate", "training data not uploaded"));
        }

        for (k, x) in population.iter().enumerate() {
            buffers.population[k * dimension..(k + 1) * dimension].copy_from_slice(x);
        }

        let count = population.len();
        kernel::launch(workers, buffers, shape, count, block_size, metric)?;

        Ok(&buffers.fitness[..count])
    }

    /// Reads one fitness slot of the last evaluation.
    pub fn fitness_slot(&self, index: usize) -> Result<f64> {
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| DgcError::accelerator("fitness_slot", "context already released"))?;
        buffers.fitness.get(index).copied().ok_or_else(|| {
            DgcError::validation(format!(
                "fitness slot {} out of range (capacity {})",
                index, self.shape.capacity
            ))
        })
    }

    /// Overwrites one fitness slot.
    pub fn set_fitness_slot(&mut self, index: usize, value: f64) -> Result<()> {
        let capacity = self.shape.capacity;
        let buffers = self.buffers_mut("set_fitness_slot")?;
        let slot = buffers.fitness.get_mut(index).ok_or_else(|| {
            DgcError::validation(format!(
                "fitness slot {} out of range (capacity {})",
                index, capacity
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Frees buffers and worker units.
    ///
    /// # Errors
    /// [`DgcError::AcceleratorError`] if the context was already released.
    pub fn release(&mut self) -> Result<()> {
        if self.buffers.take().is_none() {
            return Err(DgcError::accelerator("release", "context already released"));
        }
        self.workers = None;
        log::info!("Accelerator context released");
        Ok(())
    }
}

impl Drop for AcceleratorContext {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!("Accelerator context dropped without explicit release; releasing now");
            if let Err(e) = self.release() {
                log::error!("Error releasing accelerator context in Drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> ContextShape {
        ContextShape {
            capacity: 4,
            num_attributes: 2,
            num_instances: 3,
            num_classes: 2,
        }
    }

    #[test]
    fn test_worker_units_bounds() {
        let too_many = AcceleratorConfig {
            worker_units: MAX_WORKER_UNITS + 1,
            ..AcceleratorConfig::default()
        };
        assert!(matches!(
            AcceleratorContext::prepare(shape(), &too_many),
            Err(DgcError::AcceleratorError { .. })
        ));

        let none = AcceleratorConfig {
            worker_units: 0,
            ..AcceleratorConfig::default()
        };
        assert!(AcceleratorContext::prepare(shape(), &none).is_err());
    }

    #[test]
    fn test_rows_are_padded() {
        let ctx = AcceleratorContext::prepare(shape(), &AcceleratorConfig::default()).unwrap();
        let buffers = ctx.buffers.as_ref().unwrap();
        assert_eq!(buffers.stride, ALIGNMENT);
        assert_eq!(buffers.values.len(), 2 * ALIGNMENT);
        assert_eq!(buffers.population.len(), 4 * 4);
    }

    #[test]
    fn test_release_exactly_once() {
        let mut ctx = AcceleratorContext::prepare(shape(), &AcceleratorConfig::default()).unwrap();
        assert!(ctx.release().is_ok());
        assert!(ctx.is_released());
        assert!(matches!(ctx.release(), Err(DgcError::AcceleratorError { .. })));
        assert!(ctx.evaluate(&[], FitnessMetric::ErrorRate).is_err());
    }

    #[test]
    fn test_evaluate_before_upload_fails() {
        let mut ctx = AcceleratorContext::prepare(shape(), &AcceleratorConfig::default()).unwrap();
        let population = vec![vec![1.0; 4]];
        assert!(matches!(
            ctx.evaluate(&population, FitnessMetric::ErrorRate),
            Err(DgcError::AcceleratorError { .. })
        ));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut ctx = AcceleratorContext::prepare(shape(), &AcceleratorConfig::default()).unwrap();
        let population = vec![vec![1.0; 4]; 5];
        assert!(matches!(
            ctx.evaluate(&population, FitnessMetric::ErrorRate),
            Err(DgcError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_fitness_slot_accessors() {
        let mut ctx = AcceleratorContext::prepare(shape(), &AcceleratorConfig::default()).unwrap();
        ctx.set_fitness_slot(2, 0.75).unwrap();
        assert_eq!(ctx.fitness_slot(2).unwrap(), 0.75);
        assert!(ctx.fitness_slot(4).is_err());
    }
}
