//! # dgc-core
//!
//! Core types, traits, and errors for the data gravitation classification workspace.
//!
//! This crate defines the fundamental abstractions used across all DGC components:
//! - **Types**: attributes, instances, datasets, fitness metrics
//! - **Traits**: FitnessEvaluator, ContinuousOptimizer, OptimizerFactory
//! - **Errors**: Unified error handling with DgcError
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    dgc-core     │  ← Core types/traits
//! └─────────────────┘
//!         ▲
//!    ┌────┴───────────────┐
//!    │                    │
//! ┌──▼──────────┐  ┌──────▼─────┐
//! │ dgc-gravity │  │ dgc-optim  │
//! └─────────────┘  └────────────┘
//!    ▲       ▲            ▲
//!    │  ┌────┴───────┐    │
//!    │  │ dgc-accel  │    │
//!    │  └────────────┘    │
//!    │       ▲            │
//!    └───────┼────────────┘
//!            │
//!   ┌────────▼────────┐
//!   │  dgc-pipeline   │
//!   └─────────────────┘
//! ```

pub mod errors;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use errors::{DgcError, Result};
pub use traits::{
    ContinuousOptimizer, FitnessEvaluator, OptimizerFactory, OptimizerSetup, StopReason,
};
pub use types::{Attribute, AttributeKind, Dataset, FitnessMetric, Instance, Interval, Metadata};
