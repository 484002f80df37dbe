//! Capability traits shared by the evaluators, the optimizer and the driver.
//!
//! The driver only ever sees these traits: a population scorer and a
//! continuous black-box optimizer. Backends and optimizer implementations are
//! substitutable behind them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::errors::Result;

/// Scores a population of candidate weight vectors.
///
/// Lower fitness is better. Implementations must either fill every slot of the
/// returned vector or fail the whole call; a partially scored population is
/// never returned.
pub trait FitnessEvaluator: Send + Sync {
    /// Scores every candidate; `result[i]` belongs to `population[i]`.
    fn values_of(&self, population: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Scores a single candidate (used for the optimizer's running mean).
    fn value_of(&self, x: &[f64]) -> Result<f64>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Releases backend resources at run end. Default: nothing to release.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Why an optimizer run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// Best fitness reached the configured target
    TargetFitness { fitness: f64, target: f64 },

    /// Function-evaluation budget exhausted
    MaxFunEvals { evaluations: u64, limit: u64 },

    /// Generation budget exhausted
    MaxIter { generations: u64, limit: u64 },

    /// Fitness range of the current generation and recent history below tolerance
    TolFun { range: f64, tolerance: f64 },

    /// Fitness range of the best-per-generation history below tolerance
    TolFunHist { range: f64, tolerance: f64 },

    /// Search distribution collapsed in every coordinate
    TolX { spread: f64, tolerance: f64 },

    /// Covariance matrix condition number too large
    ConditionCov { condition: f64, limit: f64 },
}

impl StopReason {
    /// Stop reasons that end the whole multi-restart run, not only the current restart.
    pub fn terminates_all_restarts(&self) -> bool {
        matches!(
            self,
            StopReason::TargetFitness { .. } | StopReason::MaxFunEvals { .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetFitness { fitness, target } => {
                write!(f, "Fitness: {:e} <= target {:e}", fitness, target)
            }
            StopReason::MaxFunEvals { evaluations, limit } => {
                write!(f, "MaxFunEvals: {} >= {}", evaluations, limit)
            }
            StopReason::MaxIter { generations, limit } => {
                write!(f, "MaxIter: {} >= {}", generations, limit)
            }
            StopReason::TolFun { range, tolerance } => {
                write!(f, "TolFun: fitness range {:e} <= {:e}", range, tolerance)
            }
            StopReason::TolFunHist { range, tolerance } => {
                write!(f, "TolFunHist: history range {:e} <= {:e}", range, tolerance)
            }
            StopReason::TolX { spread, tolerance } => {
                write!(f, "TolX: spread {:e} < {:e}", spread, tolerance)
            }
            StopReason::ConditionCov { condition, limit } => {
                write!(f, "ConditionCov: {:e} > {:e}", condition, limit)
            }
        }
    }
}

/// Everything an optimizer needs to start one restart.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSetup {
    /// Search dimension (`A * C`)
    pub dimension: usize,

    /// Candidates sampled per generation
    pub population_size: usize,

    /// Per-coordinate lower bounds
    pub lower: Vec<f64>,

    /// Per-coordinate upper bounds
    pub upper: Vec<f64>,

    /// Random seed for this restart
    pub seed: u64,

    /// Evaluations already spent by earlier restarts
    pub initial_evaluations: u64,

    /// Generation budget for this restart (`None` = optimizer default)
    pub max_generations: Option<u64>,

    /// Evaluation budget across all restarts (`None` = unbounded)
    pub max_evaluations: Option<u64>,
}

/// Continuous black-box optimizer driven generation by generation.
pub trait ContinuousOptimizer: Send {
    /// Finalizes the setup and returns a fitness buffer sized to the population.
    fn init(&mut self) -> Result<Vec<f64>>;

    /// Samples a new generation of candidates.
    fn sample_population(&mut self) -> Vec<Vec<f64>>;

    /// Feeds one fitness per sampled candidate back into the search distribution.
    fn update_distribution(&mut self, fitness: &[f64]) -> Result<()>;

    /// Active stop conditions; empty while the search should continue.
    fn stop_reasons(&self) -> Vec<StopReason>;

    /// Running mean of the search distribution.
    fn mean_x(&self) -> Vec<f64>;

    /// Reports the fitness of the running mean (counts as one evaluation).
    fn set_fitness_of_mean_x(&mut self, fitness: f64);

    /// Evaluations consumed so far, including `initial_evaluations`.
    fn count_evaluations(&self) -> u64;

    /// Completed generations of this restart.
    fn generation(&self) -> u64;

    /// Convenience: true while no stop condition fires.
    fn should_continue(&self) -> bool {
        self.stop_reasons().is_empty()
    }

    /// Implementation-specific metrics for logging. Default: none.
    fn telemetry(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}

/// Builds a fresh optimizer for each restart.
pub trait OptimizerFactory: Send + Sync {
    fn create(&self, setup: &OptimizerSetup) -> Result<Box<dyn ContinuousOptimizer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminating_stop_reasons() {
        assert!(StopReason::TargetFitness {
            fitness: 0.0,
            target: 0.0
        }
        .terminates_all_restarts());
        assert!(StopReason::MaxFunEvals {
            evaluations: 10,
            limit: 10
        }
        .terminates_all_restarts());
        assert!(!StopReason::TolFun {
            range: 0.0,
            tolerance: 1e-12
        }
        .terminates_all_restarts());
    }

    #[test]
    fn test_stop_reason_display_prefix() {
        let reason = StopReason::MaxFunEvals {
            evaluations: 12,
            limit: 10,
        };
        assert!(reason.to_string().starts_with("MaxFunEvals"));
    }
}
