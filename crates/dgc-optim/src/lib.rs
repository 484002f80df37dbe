//! # dgc-optim
//!
//! Continuous black-box optimization for the gravitation weight vector.
//!
//! [`CmaOptimizer`] is a CPU CMA-ES (rank-one + rank-mu covariance update,
//! cumulative step-size adaptation) that implements
//! [`dgc_core::ContinuousOptimizer`]; [`CmaFactory`] builds one per restart.

pub mod cma;
pub mod params;

pub use cma::{CmaFactory, CmaOptimizer, CmaState};
pub use params::{default_population_size, CmaOptions, CmaParams};
