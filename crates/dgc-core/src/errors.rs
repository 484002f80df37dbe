//! Error types for DGC.
//!
//! One taxonomy for the whole workspace: configuration, resource, numeric and
//! concurrency failures all surface as [`DgcError`].

use thiserror::Error;

/// Unified error type for all DGC operations.
///
/// Provides structured, actionable error messages with context.
#[derive(Error, Debug)]
pub enum DgcError {
    /// Configuration validation errors (invalid dimension, wrong class count for a metric)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input validation errors (malformed dataset, weight vector of wrong length)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Accelerator backend errors (unavailable device, buffer overflow, use after release)
    #[error("Accelerator error in {context}: {message}")]
    AcceleratorError { context: String, message: String },

    /// Resource exhaustion (population larger than the prepared capacity)
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A worker task failed while scoring its slot
    #[error("Worker task {task} failed: {message}")]
    WorkerFailed { task: usize, message: String },

    /// A generation did not complete within the bounded wait
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The wait for a generation was interrupted before every slot was filled
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Optimizer lifecycle errors (fitness array of the wrong size, update before sampling)
    #[error("Optimizer error: {0}")]
    OptimizerError(String),

    /// Mathematical/numerical errors (e.g., NaN fitness)
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// I/O errors (configuration and model files)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic errors (fallback)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DgcError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        DgcError::ConfigError(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DgcError::ValidationError(message.into())
    }

    /// Creates an accelerator error with context.
    pub fn accelerator(context: impl Into<String>, message: impl Into<String>) -> Self {
        DgcError::AcceleratorError {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        DgcError::ResourceExhausted(message.into())
    }

    /// Creates a worker failure for the given task slot.
    pub fn worker(task: usize, message: impl Into<String>) -> Self {
        DgcError::WorkerFailed {
            task,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        DgcError::Timeout(message.into())
    }

    /// Creates an interrupted error.
    pub fn interrupted(message: impl Into<String>) -> Self {
        DgcError::Interrupted(message.into())
    }

    /// Creates an optimizer error.
    pub fn optimizer(message: impl Into<String>) -> Self {
        DgcError::OptimizerError(message.into())
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        DgcError::NumericalError(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DgcError::Internal(message.into())
    }

    /// Checks if this error must stop the run without any retry.
    ///
    /// Configuration and resource errors are surfaced at setup and never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DgcError::ConfigError(_)
                | DgcError::ValidationError(_)
                | DgcError::AcceleratorError { .. }
                | DgcError::ResourceExhausted(_)
        )
    }

    /// Returns a user-friendly error message with actionable guidance.
    pub fn user_message(&self) -> String {
        match self {
            DgcError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n\
                     → Review the run configuration and ensure all required fields are set.\n\
                     → The AUC metric requires a dataset with exactly two classes.",
                    msg
                )
            }
            DgcError::AcceleratorError { context, message } => {
                format!(
                    "Accelerator error in {}: {}\n\
                     → Check the accelerator worker-unit count (1..=16).\n\
                     → Select the cpu backend explicitly if no accelerator is available.",
                    context, message
                )
            }
            DgcError::ValidationError(msg) => {
                format!(
                    "Validation error: {}\n\
                     → Every instance must carry one value per attribute and a class label below the class count.",
                    msg
                )
            }
            DgcError::ResourceExhausted(msg) => {
                format!(
                    "Resource exhausted: {}\n\
                     → Prepare the accelerator with a population capacity at least as large as the optimizer's population.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for DGC operations.
pub type Result<T> = std::result::Result<T, DgcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let acc_err = DgcError::accelerator("prepare", "no worker units");
        assert!(matches!(acc_err, DgcError::AcceleratorError { .. }));

        let config_err = DgcError::config("Invalid dimension");
        assert!(matches!(config_err, DgcError::ConfigError(_)));

        let worker_err = DgcError::worker(3, "panicked");
        assert!(matches!(worker_err, DgcError::WorkerFailed { task: 3, .. }));
        assert_eq!(worker_err.to_string(), "Worker task 3 failed: panicked");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(DgcError::config("AUC on 3 classes").is_fatal());
        assert!(DgcError::accelerator("prepare", "unavailable").is_fatal());

        assert!(!DgcError::timeout("generation 4").is_fatal());
        assert!(!DgcError::worker(0, "boom").is_fatal());
    }

    #[test]
    fn test_user_message_has_guidance() {
        let msg = DgcError::config("metric auc with 3 classes").user_message();
        assert!(msg.contains("exactly two classes"));
    }
}
