//! Remote service registration record and its health state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// HealthStatus
// ---------------------------------------------------------------------------

/// Health of a registered remote service.
///
/// Variant names use `SCREAMING_CASE` on the wire to match the documented
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum HealthStatus {
    /// Registered but no heartbeat observed yet.
    UNKNOWN,
    /// At least one heartbeat within the staleness threshold.
    HEALTHY,
    /// Heartbeat older than the staleness threshold; excluded from routing.
    UNHEALTHY,
}

impl HealthStatus {
    /// Stable lowercase label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UNKNOWN => "unknown",
            Self::HEALTHY => "healthy",
            Self::UNHEALTHY => "unhealthy",
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceRegistration
// ---------------------------------------------------------------------------

/// A remote provider registration as accepted and returned by the registry
/// endpoints.
///
/// `last_heartbeat` and `status` are owned by the health registry: values
/// supplied by the caller on `register` are ignored and re-initialized
/// server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    /// Unique registry key.
    pub service_name: String,
    /// Operations this provider can execute. Must be non-empty.
    pub operations: Vec<String>,
    /// Base URL operations are invoked against.
    pub endpoint: String,
    /// URL probed by the active health-check strategy.
    pub health_check: String,
    /// Free-form provider metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Epoch milliseconds of the most recent heartbeat.
    #[serde(default)]
    pub last_heartbeat: u64,
    #[serde(default = "default_status")]
    pub status: HealthStatus,
}

fn default_status() -> HealthStatus {
    HealthStatus::UNKNOWN
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
