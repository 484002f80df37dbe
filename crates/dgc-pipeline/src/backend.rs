//! Evaluation backend selection.
//!
//! The driver only sees [`FitnessEvaluator`]; [`Backend`] is the tagged
//! variant that owns whichever evaluator the configuration asked for. A
//! backend that cannot be set up is an error, never a silent switch to the
//! other one.

use dgc_accel::AcceleratedEvaluator;
use dgc_core::{FitnessEvaluator, Result};
use dgc_gravity::{CpuEvaluator, NormalizationModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DgcConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Host threads, one short-lived pool per generation
    #[default]
    Cpu,

    /// Accelerator context held for the whole run
    Accelerator,
}

pub enum Backend {
    Cpu(CpuEvaluator),
    Accelerator(AcceleratedEvaluator),
}

impl Backend {
    /// Builds the configured backend for populations of `population_size`
    /// candidates (plus the running mean, scored separately).
    pub fn build(
        config: &DgcConfig,
        model: Arc<NormalizationModel>,
        population_size: usize,
    ) -> Result<Self> {
        match config.backend {
            BackendKind::Cpu => {
                let mut evaluator = CpuEvaluator::new(model, config.metric)?
                    .with_timeout(config.evaluation_timeout());
                if let Some(threads) = config.worker_threads {
                    evaluator = evaluator.with_worker_threads(threads);
                }
                Ok(Backend::Cpu(evaluator))
            }
            BackendKind::Accelerator => Ok(Backend::Accelerator(AcceleratedEvaluator::new(
                model,
                config.metric,
                population_size,
                &config.accelerator,
            )?)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Cpu(_) => BackendKind::Cpu,
            Backend::Accelerator(_) => BackendKind::Accelerator,
        }
    }

    fn inner(&self) -> &dyn FitnessEvaluator {
        match self {
            Backend::Cpu(evaluator) => evaluator,
            Backend::Accelerator(evaluator) => evaluator,
        }
    }
}

impl FitnessEvaluator for Backend {
    fn values_of(&self, population: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.inner().values_of(population)
    }

    fn value_of(&self, x: &[f64]) -> Result<f64> {
        self.inner().value_of(x)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn release(&mut self) -> Result<()> {
        match self {
            Backend::Cpu(evaluator) => evaluator.release(),
            Backend::Accelerator(evaluator) => evaluator.release(),
        }
    }
}
