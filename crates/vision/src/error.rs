//! Errors from the vision-model boundary.

use cardex_core::retry::Retryable;

/// Errors that can occur when invoking a vision model.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Failed to reach the model endpoint at all.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The endpoint answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request ran out of time.
    #[error("Request timeout")]
    Timeout,

    /// The response envelope was not in the expected shape.
    #[error("Invalid response envelope: {0}")]
    InvalidResponse(String),

    /// The model's output did not validate against the stage schema.
    #[error("Output did not match the stage schema: {0}")]
    SchemaInvalid(String),
}

impl Retryable for VisionError {
    /// Connection faults, timeouts, and throttling/server statuses are
    /// transient; a response that parsed but failed validation is a
    /// terminal outcome for the run.
    fn is_transient(&self) -> bool {
        match self {
            VisionError::Connection(_) | VisionError::Timeout => true,
            VisionError::Api { status, .. } => *status == 429 || *status >= 500,
            VisionError::InvalidResponse(_) | VisionError::SchemaInvalid(_) => false,
        }
    }
}
