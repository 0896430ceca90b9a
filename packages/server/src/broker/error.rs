//! Broker error taxonomy.
//!
//! Every failure inside the broker is one of these variants. The dispatcher
//! catches all of them at its boundary and converts them into a
//! `ServiceResponse` error list; nothing here ever escapes as a panic.

use switchboard_core::codes;

/// Errors produced anywhere along the submit pipeline.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Malformed request shape (blank request id, service, or operation),
    /// or an invalid registration payload.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A declared required parameter was absent.
    #[error("missing required parameter: {name}")]
    MissingParameter { name: String },

    /// A parameter was present but of the wrong kind. No coercion is
    /// attempted.
    #[error("parameter `{name}` expected {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Field-level decryption failed. A payload produced under a rotated
    /// key lands here; it is never silently replaced with a default value.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// No local handler and no eligible remote provider.
    #[error("no eligible provider for operation `{operation}`")]
    ServiceUnavailable { operation: String },

    /// Remote invocation failed or returned a non-success status.
    #[error("upstream call failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// A local handler returned an error. The handler's failure is wrapped,
    /// never propagated raw.
    #[error("operation failed: {0}")]
    Operation(String),

    /// Registry lookup for an unregistered name.
    #[error("service `{name}` is not registered")]
    NotFound { name: String },

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BrokerError {
    /// Stable wire code for this error, from [`switchboard_core::codes`].
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => codes::VALIDATION_ERROR,
            Self::MissingParameter { .. } => codes::MISSING_PARAMETER,
            Self::ParameterType { .. } => codes::PARAMETER_TYPE,
            Self::Decryption(_) => codes::DECRYPTION_ERROR,
            Self::ServiceUnavailable { .. } => codes::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => codes::UPSTREAM_ERROR,
            Self::Operation(_) => codes::OPERATION_ERROR,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Internal(_) => codes::INTERNAL_ERROR,
        }
    }
}
