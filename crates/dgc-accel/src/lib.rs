//! # dgc-accel
//!
//! Accelerator-offloaded population scoring. The context owns its buffers and
//! worker units for one run (`prepare` / `upload` / `evaluate` / `release`) and
//! produces exactly the fitness values the host evaluator produces.

pub mod context;
pub mod evaluator;
mod kernel;

pub use context::{
    AcceleratorConfig, AcceleratorContext, ContextShape, TrainingAccess, ALIGNMENT,
    DEFAULT_BLOCK_SIZE, MAX_WORKER_UNITS,
};
pub use evaluator::AcceleratedEvaluator;
