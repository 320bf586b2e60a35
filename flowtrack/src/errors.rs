//! Error types for the flowtrack core.
//!
//! These errors only cover construction-time concerns (flow validation and
//! configuration parsing). Runtime completion semantics never raise errors
//! across the stage/dispatcher boundary; stage-reported failures travel as
//! error outcomes inside completion events instead.

use thiserror::Error;

/// The main error type for flowtrack operations.
#[derive(Debug, Error)]
pub enum FlowtrackError {
    /// A flow validation error occurred.
    #[error("{0}")]
    Validation(#[from] FlowValidationError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised when flow validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FlowValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl FlowValidationError {
    /// Creates a new flow validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}
