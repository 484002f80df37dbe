//! Batch gravity kernel.
//!
//! Candidates are split into blocks of `block_size`; blocks run on the
//! context's worker units and every candidate of a block classifies the whole
//! training set. Candidate `k` writes only `fitness[k]`.
//!
//! The arithmetic follows the host classifier operation for operation
//! (attribute order, instance order, absorbing zero distance, class-imbalance
//! factor, first-class tie rule), so both paths produce identical fitness.

use dgc_core::{FitnessMetric, Result};
use dgc_gravity::ConfusionMatrix;
use rayon::prelude::*;

use crate::context::{ContextShape, DeviceBuffers};

/// Scores the first `count` candidates of the population buffer.
pub(crate) fn launch(
    workers: &rayon::ThreadPool,
    buffers: &mut DeviceBuffers,
    shape: ContextShape,
    count: usize,
    block_size: usize,
    metric: FitnessMetric,
) -> Result<()> {
    let dimension = shape.dimension();
    let DeviceBuffers {
        values,
        labels,
        class_counts,
        numerical,
        stride,
        population,
        fitness,
        ..
    } = buffers;
    let training = TrainingView {
        values: values.as_slice(),
        labels: labels.as_slice(),
        class_counts: class_counts.as_slice(),
        numerical: numerical.as_slice(),
        stride: *stride,
        shape,
    };

    let population = &population[..count * dimension];
    let fitness = &mut fitness[..count];

    workers.install(|| {
        fitness
            .par_chunks_mut(block_size)
            .zip(population.par_chunks(block_size * dimension))
            .try_for_each(|(block_fitness, block_population)| {
                for (slot, weights) in block_fitness
                    .iter_mut()
                    .zip(block_population.chunks_exact(dimension))
                {
                    *slot = training.score(weights, metric)?;
                }
                Ok(())
            })
    })
}

struct TrainingView<'a> {
    values: &'a [f64],
    labels: &'a [usize],
    class_counts: &'a [usize],
    numerical: &'a [bool],
    stride: usize,
    shape: ContextShape,
}

impl TrainingView<'_> {
    fn score(&self, weights: &[f64], metric: FitnessMetric) -> Result<f64> {
        let n = self.shape.num_instances;
        let predicted: Vec<usize> = (0..n).map(|q| self.classify(q, weights)).collect();
        let matrix =
            ConfusionMatrix::from_labels(self.shape.num_classes, self.labels.iter().copied(), &predicted)?;
        matrix.fitness(metric)
    }

    /// Class of training instance `query`, excluding itself by index.
    fn classify(&self, query: usize, weights: &[f64]) -> usize {
        let mut max_gravity = -1.0;
        let mut max_class = 0;

        for class in 0..self.shape.num_classes {
            let gravity = self.gravity(query, class, weights);
            if gravity > max_gravity {
                max_gravity = gravity;
                max_class = class;
            }
        }

        max_class
    }

    fn gravity(&self, query: usize, class: usize, weights: &[f64]) -> f64 {
        let n = self.shape.num_instances;
        let mut gravity = 0.0;

        for other in 0..n {
            if self.labels[other] != class || other == query {
                continue;
            }
            let distance = self.distance(query, other, weights);
            if distance == 0.0 {
                return f64::MAX;
            }
            gravity += 1.0 / distance;
        }

        let share = (self.class_counts[class] as f64 - 1.0) / n as f64;
        gravity * (1.0 - share)
    }

    fn distance(&self, a: usize, b: usize, weights: &[f64]) -> f64 {
        let num_attributes = self.shape.num_attributes;
        let row = &weights[self.labels[b] * num_attributes..(self.labels[b] + 1) * num_attributes];
        let mut distance = 0.0;

        for attribute in 0..num_attributes {
            let base = attribute * self.stride;
            let va = self.values[base + a];
            let vb = self.values[base + b];
            let term = if self.numerical[attribute] {
                (vb - va) * (vb - va)
            } else if va == vb {
                0.0
            } else {
                1.0
            };
            distance += row[attribute] * term;
        }

        distance
    }
}
