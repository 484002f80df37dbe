//! # dgc-pipeline
//!
//! Training runs end to end: configuration, backend selection, the
//! multi-restart driver and trained-model persistence.
//!
//! ```rust,no_run
//! use dgc_pipeline::{train, DgcConfig};
//! # fn run(train_set: dgc_core::Dataset) -> anyhow::Result<()> {
//! let config = DgcConfig::from_file("dgc.toml")?;
//! config.validate()?;
//! let run = train(&config, train_set, None)?;
//! println!("{}", run.model.render_weights());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod driver;
pub mod model;

pub use backend::{Backend, BackendKind};
pub use config::DgcConfig;
pub use driver::{train, DriverSettings, OptimizationDriver, RestartSummary, TrainedRun, TrainingOutcome};
pub use model::TrainedModel;
