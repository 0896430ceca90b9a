//! External service invoker: remote operation calls and health probes.
//!
//! Every transport-level failure (timeout, connection refused, malformed
//! response) is normalized into a non-throwing [`InvocationResult`]; the
//! dispatcher decides how to surface it.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

// ---------------------------------------------------------------------------
// InvocationResult
// ---------------------------------------------------------------------------

/// Outcome of one remote call.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    /// HTTP status when the remote side answered at all.
    pub status_code: Option<u16>,
    /// Response body on success; `Null` otherwise.
    pub body: Value,
    /// Failure detail when `success` is false.
    pub error_message: Option<String>,
}

impl InvocationResult {
    /// A successful call with the given status and body.
    #[must_use]
    pub fn success(status_code: u16, body: Value) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            body,
            error_message: None,
        }
    }

    /// A failed call; `status_code` is present for non-success HTTP answers
    /// and absent for transport failures.
    #[must_use]
    pub fn failure(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            body: Value::Null,
            error_message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// ExternalInvoker
// ---------------------------------------------------------------------------

/// Abstraction over performing a remote call and probing a health endpoint.
///
/// The dispatcher and the sweep worker both depend on this trait, which
/// keeps the network edge mockable in tests.
#[async_trait]
pub trait ExternalInvoker: Send + Sync {
    /// Invokes `operation` against a registration's endpoint with the given
    /// params. Never returns `Err`; failures are carried in the result.
    async fn invoke_operation(
        &self,
        endpoint: &str,
        operation: &str,
        params: &BTreeMap<String, Value>,
    ) -> InvocationResult;

    /// Active probe of a registration's health-check URL. True means the
    /// endpoint answered with a success status within the probe timeout.
    async fn health_check(&self, url: &str) -> bool;
}

// ---------------------------------------------------------------------------
// HttpInvoker
// ---------------------------------------------------------------------------

/// reqwest-backed invoker.
///
/// Operations POST a JSON envelope `{ "operation": ..., "params": ... }` to
/// the registration's endpoint; health probes GET the health-check URL with
/// a shorter independent timeout.
pub struct HttpInvoker {
    client: reqwest::Client,
    probe_client: reqwest::Client,
}

impl HttpInvoker {
    /// Creates an invoker with bounded timeouts for calls and probes.
    ///
    /// # Errors
    ///
    /// Fails if the underlying TLS/connection pool cannot be initialized.
    pub fn new(invoke_timeout: Duration, probe_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(invoke_timeout).build()?,
            probe_client: reqwest::Client::builder().timeout(probe_timeout).build()?,
        })
    }
}

#[async_trait]
impl ExternalInvoker for HttpInvoker {
    async fn invoke_operation(
        &self,
        endpoint: &str,
        operation: &str,
        params: &BTreeMap<String, Value>,
    ) -> InvocationResult {
        let envelope = json!({
            "operation": operation,
            "params": params,
        });

        let response = match self.client.post(endpoint).json(&envelope).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(endpoint, operation, error = %err, "remote call failed to send");
                return InvocationResult::failure(None, err.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return InvocationResult::failure(
                Some(status.as_u16()),
                format!("remote returned {status}"),
            );
        }

        match response.json::<Value>().await {
            Ok(body) => InvocationResult::success(status.as_u16(), body),
            Err(err) => InvocationResult::failure(
                Some(status.as_u16()),
                format!("malformed response body: {err}"),
            ),
        }
    }

    async fn health_check(&self, url: &str) -> bool {
        match self.probe_client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(url, error = %err, "health probe failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
