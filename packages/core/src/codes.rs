//! Stable error-code strings carried in [`crate::ErrorEntry::code`].
//!
//! These are part of the wire contract: clients branch on them, so they
//! never change once published.

/// Malformed request shape (blank request id, service, or operation).
pub const VALIDATION_ERROR: &str = "validation_error";
/// A declared required parameter was absent from the request.
pub const MISSING_PARAMETER: &str = "missing_parameter";
/// A parameter was present but of the wrong kind.
pub const PARAMETER_TYPE: &str = "parameter_type";
/// Field-level decryption failed (wrong or rotated key, corrupt payload).
pub const DECRYPTION_ERROR: &str = "decryption_error";
/// No local handler and no eligible remote provider for the operation.
pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
/// Remote invocation failed or returned a non-success status.
pub const UPSTREAM_ERROR: &str = "upstream_error";
/// A local handler returned an error.
pub const OPERATION_ERROR: &str = "operation_error";
/// Registry lookup for a name that is not registered.
pub const NOT_FOUND: &str = "not_found";
/// Anything unexpected.
pub const INTERNAL_ERROR: &str = "internal_error";
