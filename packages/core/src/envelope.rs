//! Request and response envelopes for broker submissions.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so the JSON wire
//! shape matches the documented contract (`requestId`, not `request_id`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ServiceRequest
// ---------------------------------------------------------------------------

/// A self-describing operation request submitted to the broker.
///
/// Immutable once submitted: the dispatcher consumes it by value and never
/// hands a mutable reference to handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    /// Caller-supplied correlation id, echoed back in the response.
    pub request_id: String,
    /// Logical target service name.
    pub service: String,
    /// Routing key resolved against local handlers first, then the registry.
    pub operation: String,
    /// Heterogeneous operation parameters. `BTreeMap` keeps serialization
    /// order deterministic.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// When true, string-valued params arrive encrypted and the result is
    /// encrypted before being returned.
    #[serde(default)]
    pub encrypt: bool,
}

// ---------------------------------------------------------------------------
// ErrorEntry
// ---------------------------------------------------------------------------

/// One entry of the ordered error list in a [`ServiceResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Stable machine-readable code from [`crate::codes`].
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

// ---------------------------------------------------------------------------
// ServiceResponse
// ---------------------------------------------------------------------------

/// Uniform response envelope, created exactly once per request by the
/// dispatcher. No exception ever crosses the broker boundary; failures are
/// carried in `errors` with `ok = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub ok: bool,
    /// Opaque result value. `Null` for failures and for handlers that
    /// produce no data.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    /// Echo of the request's correlation id.
    pub request_id: String,
    /// Mirrors the request flag so the caller knows the payload needs
    /// decryption.
    #[serde(default)]
    pub encrypt: bool,
}

impl ServiceResponse {
    /// Builds a success envelope carrying `data`.
    #[must_use]
    pub fn success(request_id: impl Into<String>, data: Value, encrypt: bool) -> Self {
        Self {
            ok: true,
            data,
            errors: Vec::new(),
            request_id: request_id.into(),
            encrypt,
        }
    }

    /// Builds a failure envelope with a single error entry.
    #[must_use]
    pub fn failure(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            data: Value::Null,
            errors: vec![ErrorEntry {
                code: code.into(),
                message: message.into(),
            }],
            request_id: request_id.into(),
            encrypt: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
