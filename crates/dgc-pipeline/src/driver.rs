//! Multi-restart optimization driver.
//!
//! Each restart builds a fresh optimizer seeded with `seed + restart`, runs
//! generations until a stop condition fires, scores the running mean as one
//! extra candidate and keeps the restart's best. The best over all restarts
//! becomes the classifier's weight vector.

use dgc_core::{
    Dataset, DgcError, FitnessEvaluator, OptimizerFactory, OptimizerSetup, Result, StopReason,
};
use dgc_gravity::{best_of, best_solution, GravitationClassifier, NormalizationModel, Solution};
use dgc_optim::CmaFactory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::DgcConfig;
use crate::model::TrainedModel;

/// Resolved driver parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub seed: u64,
    pub max_restarts: usize,
    pub population_size: usize,
    pub max_generations: Option<u64>,
    pub max_evaluations: Option<u64>,
}

impl DriverSettings {
    /// Resolves `config` for a weight vector of `dimension` components.
    pub fn from_config(config: &DgcConfig, dimension: usize) -> Result<Self> {
        Ok(Self {
            seed: config.seed,
            max_restarts: config.max_restarts,
            population_size: config.population_size_for(dimension)?,
            max_generations: config.max_generations,
            max_evaluations: config.max_evaluations,
        })
    }
}

/// Outcome of one restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartSummary {
    pub restart: usize,
    pub seed: u64,
    pub generations: u64,

    /// Evaluations consumed so far, all restarts included
    pub evaluations: u64,

    pub stop_reasons: Vec<StopReason>,
    pub best_fitness: f64,
    pub best_geomean: f64,
}

/// Result of a full multi-restart run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub classifier: GravitationClassifier,
    pub best: Solution,
    pub restarts: Vec<RestartSummary>,
    pub evaluations: u64,
}

pub struct OptimizationDriver {
    model: Arc<NormalizationModel>,
    settings: DriverSettings,
}

impl OptimizationDriver {
    /// # Errors
    /// [`DgcError::ConfigError`] for a zero weight dimension or zero restarts.
    pub fn new(model: Arc<NormalizationModel>, settings: DriverSettings) -> Result<Self> {
        if model.dimension() == 0 {
            return Err(DgcError::config(format!(
                "weight dimension is {} attributes x {} classes; both must be positive",
                model.num_attributes(),
                model.num_classes()
            )));
        }
        if settings.max_restarts == 0 {
            return Err(DgcError::config("at least one restart is required"));
        }
        Ok(Self { model, settings })
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Runs every restart. Any evaluation failure aborts the run.
    pub fn run(
        &self,
        evaluator: &dyn FitnessEvaluator,
        factory: &dyn OptimizerFactory,
    ) -> Result<TrainingOutcome> {
        let dimension = self.model.dimension();
        let mut bests = Vec::with_capacity(self.settings.max_restarts);
        let mut restarts = Vec::with_capacity(self.settings.max_restarts);
        let mut evaluations = 0;

        log::info!(
            "Starting {} restart(s): dimension={}, population={}, backend={}",
            self.settings.max_restarts,
            dimension,
            self.settings.population_size,
            evaluator.name()
        );

        for restart in 0..self.settings.max_restarts {
            let seed = self.settings.seed.wrapping_add(restart as u64);
            let setup = OptimizerSetup {
                dimension,
                population_size: self.settings.population_size,
                lower: vec![0.0; dimension],
                upper: vec![1.0; dimension],
                seed,
                initial_evaluations: evaluations,
                max_generations: self.settings.max_generations,
                max_evaluations: self.settings.max_evaluations,
            };

            let mut optimizer = factory.create(&setup)?;
            optimizer.init()?;

            let mut population = Vec::new();
            let mut fitness = Vec::new();
            while optimizer.should_continue() {
                population = optimizer.sample_population();
                fitness = evaluator.values_of(&population)?;
                optimizer.update_distribution(&fitness)?;
            }

            let mean = optimizer.mean_x();
            let mean_fitness = evaluator.value_of(&mean)?;
            optimizer.set_fitness_of_mean_x(mean_fitness);
            population.push(mean);
            fitness.push(mean_fitness);

            let best = best_solution(&population, &fitness)?;
            evaluations = optimizer.count_evaluations();
            let stop_reasons = optimizer.stop_reasons();

            log::info!(
                "Restart {} (seed {}) terminated after {} generations, best fitness {:.6}",
                restart + 1,
                seed,
                optimizer.generation(),
                best.fitness
            );
            for reason in &stop_reasons {
                log::info!("      {}", reason);
            }
            log::debug!("Restart {} telemetry: {:?}", restart + 1, optimizer.telemetry());

            restarts.push(RestartSummary {
                restart,
                seed,
                generations: optimizer.generation(),
                evaluations,
                stop_reasons: stop_reasons.clone(),
                best_fitness: best.fitness,
                best_geomean: best.geomean,
            });
            bests.push(best);

            if stop_reasons.iter().any(StopReason::terminates_all_restarts) {
                log::info!("Stopping remaining restarts: target fitness or evaluation budget reached");
                break;
            }
        }

        let best = best_of(&bests).ok_or_else(|| DgcError::internal("no restart produced a solution"))?;
        let classifier = GravitationClassifier::with_weights(self.model.clone(), best.x.clone())?;

        log::info!(
            "Training finished: fitness {:.6}, geomean {:.6}, {} evaluations",
            best.fitness,
            best.geomean,
            evaluations
        );

        Ok(TrainingOutcome {
            classifier,
            best,
            restarts,
            evaluations,
        })
    }
}

/// Result of [`train`]: the persisted model plus the run history.
#[derive(Debug, Clone)]
pub struct TrainedRun {
    pub model: TrainedModel,
    pub restarts: Vec<RestartSummary>,
    pub evaluations: u64,
}

/// Normalizes `train_set` (and `test_set` with the training bounds), builds
/// the configured backend, runs the driver and releases the backend.
///
/// # Errors
/// [`DgcError::ConfigError`] if `config` fails [`DgcConfig::validate`] or does
/// not fit the dataset; otherwise whatever setup or evaluation error aborted
/// the run.
pub fn train(config: &DgcConfig, train_set: Dataset, test_set: Option<&mut Dataset>) -> Result<TrainedRun> {
    config
        .validate()
        .map_err(|e| DgcError::config(format!("{:#}", e)))?;
    config.check_dataset(train_set.metadata())?;

    let model = Arc::new(NormalizationModel::prepare(train_set, test_set)?);
    let settings = DriverSettings::from_config(config, model.dimension())?;
    let driver = OptimizationDriver::new(model.clone(), settings)?;

    let mut backend = Backend::build(config, model, driver.settings().population_size)?;
    let factory = CmaFactory::new(config.cma.clone());

    let outcome = driver.run(&backend, &factory);
    let released = backend.release();
    let outcome = outcome?;
    released?;

    Ok(TrainedRun {
        model: TrainedModel::from_outcome(&outcome, config.metric),
        restarts: outcome.restarts,
        evaluations: outcome.evaluations,
    })
}
