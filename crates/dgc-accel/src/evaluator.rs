//! Accelerator-backed [`FitnessEvaluator`].

use dgc_core::{DgcError, FitnessEvaluator, FitnessMetric, Result};
use dgc_gravity::{check_metric, NormalizationModel};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::{AcceleratorConfig, AcceleratorContext, ContextShape};

/// Scores populations on an [`AcceleratorContext`] owned for the whole run.
pub struct AcceleratedEvaluator {
    context: Mutex<AcceleratorContext>,
    metric: FitnessMetric,
    model: Arc<NormalizationModel>,
}

impl AcceleratedEvaluator {
    /// Prepares a context for populations of up to `capacity` candidates and
    /// uploads the normalized training set.
    ///
    /// # Errors
    /// Configuration errors for an undefined metric, accelerator errors if the
    /// context cannot be prepared. No fallback to another backend is attempted.
    pub fn new(
        model: Arc<NormalizationModel>,
        metric: FitnessMetric,
        capacity: usize,
        config: &AcceleratorConfig,
    ) -> Result<Self> {
        check_metric(&model, metric)?;

        let shape = ContextShape {
            capacity,
            num_attributes: model.num_attributes(),
            num_instances: model.num_instances(),
            num_classes: model.num_classes(),
        };
        let mut context = AcceleratorContext::prepare(shape, config)?;
        context.upload(model.as_ref())?;

        Ok(Self {
            context: Mutex::new(context),
            metric,
            model,
        })
    }

    pub fn metric(&self) -> FitnessMetric {
        self.metric
    }

    pub fn model(&self) -> &Arc<NormalizationModel> {
        &self.model
    }

    pub fn is_released(&self) -> bool {
        self.context.lock().is_released()
    }
}

impl FitnessEvaluator for AcceleratedEvaluator {
    fn values_of(&self, population: &[Vec<f64>]) -> Result<Vec<f64>> {
        let mut context = self.context.lock();
        log::debug!(
            "Scoring {} candidates on {} accelerator worker units",
            population.len(),
            context.worker_units()
        );
        let fitness = context.evaluate(population, self.metric)?;
        Ok(fitness.to_vec())
    }

    fn value_of(&self, x: &[f64]) -> Result<f64> {
        let mut context = self.context.lock();
        let fitness = context.evaluate(&[x.to_vec()], self.metric)?;
        fitness
            .first()
            .copied()
            .ok_or_else(|| DgcError::internal("accelerator returned no fitness for a single candidate"))
    }

    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn release(&mut self) -> Result<()> {
        self.context.get_mut().release()
    }
}
