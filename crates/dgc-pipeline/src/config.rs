//! Run configuration
//!
//! Serde-based TOML configuration for one training run. Every field has a
//! default, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use dgc_accel::AcceleratorConfig;
use dgc_core::{DgcError, FitnessMetric, Metadata};
use dgc_optim::{default_population_size, CmaOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::backend::BackendKind;

/// Root configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DgcConfig {
    /// Base seed; restart `r` is seeded with `seed + r`
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of optimizer restarts
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Candidates per generation (absent or 0: `ceil(4 ln((A*C)^2))`)
    #[serde(default)]
    pub population_size: Option<usize>,

    /// Generations per restart (absent: optimizer default)
    #[serde(default)]
    pub max_generations: Option<u64>,

    /// Fitness evaluations across all restarts (absent: unbounded)
    #[serde(default)]
    pub max_evaluations: Option<u64>,

    #[serde(default)]
    pub metric: FitnessMetric,

    #[serde(default)]
    pub backend: BackendKind,

    /// CPU evaluation threads (absent: available parallelism)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Upper bound on the wait for one generation
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,

    #[serde(default)]
    pub cma: CmaOptions,

    #[serde(default)]
    pub accelerator: AcceleratorConfig,
}

impl DgcConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_restarts == 0 {
            anyhow::bail!("max_restarts must be > 0");
        }
        if self.worker_threads == Some(0) {
            anyhow::bail!("worker_threads must be > 0 when set");
        }
        if self.evaluation_timeout_secs == 0 {
            anyhow::bail!("evaluation_timeout_secs must be > 0");
        }
        if self.max_generations == Some(0) {
            anyhow::bail!("max_generations must be > 0 when set");
        }
        if !(self.cma.initial_sigma > 0.0) {
            anyhow::bail!("cma.initial_sigma must be > 0, got {}", self.cma.initial_sigma);
        }
        if !(0.0..=1.0).contains(&self.cma.initial_x) {
            anyhow::bail!("cma.initial_x must lie in [0, 1], got {}", self.cma.initial_x);
        }
        if self.cma.stop_tol_fun < 0.0 || self.cma.stop_tol_fun_hist < 0.0 {
            anyhow::bail!("cma stop tolerances must be >= 0");
        }
        if self.backend == BackendKind::Accelerator {
            self.accelerator.validate()?;
        }
        Ok(())
    }

    /// Checks the configuration against the dataset it will train on.
    pub fn check_dataset(&self, metadata: &Metadata) -> dgc_core::Result<()> {
        if metadata.num_attributes() == 0 || metadata.num_classes() == 0 {
            return Err(DgcError::config(format!(
                "weight dimension is {} attributes x {} classes; both must be positive",
                metadata.num_attributes(),
                metadata.num_classes()
            )));
        }
        self.metric.validate_classes(metadata.num_classes())
    }

    /// Population size for a weight vector of `dimension` components.
    ///
    /// # Errors
    /// [`DgcError::ConfigError`] if no size is configured and the default
    /// formula yields fewer than 2 candidates.
    pub fn population_size_for(&self, dimension: usize) -> dgc_core::Result<usize> {
        let size = match self.population_size {
            Some(size) if size > 0 => size,
            _ => default_population_size(dimension),
        };
        if size < 2 {
            return Err(DgcError::config(format!(
                "population size {} for dimension {} is below 2; set population_size explicitly",
                size, dimension
            )));
        }
        Ok(size)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }
}

impl Default for DgcConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_restarts: default_max_restarts(),
            population_size: None,
            max_generations: None,
            max_evaluations: None,
            metric: FitnessMetric::default(),
            backend: BackendKind::default(),
            worker_threads: None,
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            cma: CmaOptions::default(),
            accelerator: AcceleratorConfig::default(),
        }
    }
}

fn default_seed() -> u64 { 123456789 }
fn default_max_restarts() -> usize { 3 }
fn default_evaluation_timeout_secs() -> u64 { 30 * 24 * 60 * 60 }

#[cfg(test)]
mod tests {
    use super::*;
    use dgc_core::Attribute;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DgcConfig::from_str("").unwrap();
        assert_eq!(config, DgcConfig::default());
        assert_eq!(config.seed, 123456789);
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.cma.initial_sigma, 0.3);
        assert_eq!(config.accelerator.worker_units, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config = DgcConfig::from_str(
            r#"
            seed = 7
            metric = "auc"
            backend = "accelerator"
            population_size = 20

            [cma]
            initial_sigma = 0.2

            [accelerator]
            worker_units = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.metric, FitnessMetric::Auc);
        assert_eq!(config.backend, BackendKind::Accelerator);
        assert_eq!(config.cma.initial_sigma, 0.2);
        assert_eq!(config.cma.stop_tol_fun, 1e-12);
        assert_eq!(config.accelerator.worker_units, 4);
        assert_eq!(config.accelerator.block_size, 128);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DgcConfig::default();
        config.max_restarts = 0;
        assert!(config.validate().is_err());

        let mut config = DgcConfig::default();
        config.backend = BackendKind::Accelerator;
        config.accelerator.worker_units = 17;
        assert!(config.validate().is_err());

        let mut config = DgcConfig::default();
        config.worker_threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_population_size_fallback() {
        let config = DgcConfig::default();
        assert_eq!(config.population_size_for(4).unwrap(), 12);
        assert!(matches!(
            config.population_size_for(1),
            Err(DgcError::ConfigError(_))
        ));

        let explicit = DgcConfig {
            population_size: Some(6),
            ..DgcConfig::default()
        };
        assert_eq!(explicit.population_size_for(1).unwrap(), 6);
    }

    #[test]
    fn test_auc_needs_two_classes() {
        let metadata = Metadata::new(vec![Attribute::numerical("x", 0.0, 1.0)], "class", ["a", "b", "c"]);
        let config = DgcConfig {
            metric: FitnessMetric::Auc,
            ..DgcConfig::default()
        };
        assert!(matches!(
            config.check_dataset(&metadata),
            Err(DgcError::ConfigError(_))
        ));
        assert!(DgcConfig::default().check_dataset(&metadata).is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DgcConfig {
            max_generations: Some(50),
            ..DgcConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(DgcConfig::from_str(&text).unwrap(), config);
    }
}
