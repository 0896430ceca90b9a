//! The broker dispatcher: validation, decryption, handler resolution,
//! invocation, encryption, and audit emission around every call.
//!
//! `submit` is the sole entry point. Every failure mode is converted into a
//! `ServiceResponse` with `ok: false` — no error crosses this boundary as a
//! panic or `Err`. Resolution is local-first: a local descriptor always
//! wins over any remote registration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use serde_json::Value;
use tracing::{info, warn};

use switchboard_core::{now_millis, ServiceRequest, ServiceResponse};

use super::audit::{AuditEvent, AuditOutcome, AuditSink};
use super::config::BrokerConfig;
use super::crypto::{self, StringCipher};
use super::error::BrokerError;
use super::health::ServiceHealthRegistry;
use super::invoker::ExternalInvoker;
use super::registry::OperationRegistry;

/// Orchestrates the full submit pipeline over the broker's collaborators.
pub struct Dispatcher {
    operations: Arc<OperationRegistry>,
    health: Arc<ServiceHealthRegistry>,
    invoker: Arc<dyn ExternalInvoker>,
    audit: Arc<dyn AuditSink>,
    cipher: Option<Arc<dyn StringCipher>>,
    invoke_timeout: Duration,
}

impl Dispatcher {
    /// Wires the dispatcher to its collaborators.
    ///
    /// `cipher` is optional: a broker without one rejects `encrypt: true`
    /// requests with a `Decryption` failure instead of guessing.
    pub fn new(
        operations: Arc<OperationRegistry>,
        health: Arc<ServiceHealthRegistry>,
        invoker: Arc<dyn ExternalInvoker>,
        audit: Arc<dyn AuditSink>,
        cipher: Option<Arc<dyn StringCipher>>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            operations,
            health,
            invoker,
            audit,
            cipher,
            invoke_timeout: Duration::from_millis(config.invoke_timeout_ms),
        }
    }

    /// Executes one request end to end and builds the response envelope
    /// exactly once.
    pub async fn submit(&self, request: ServiceRequest) -> ServiceResponse {
        let start = Instant::now();
        counter!("broker_requests_total").increment(1);

        let result = self.run(&request).await;

        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(err) => AuditOutcome::Failure { code: err.code() },
        };
        self.emit_audit(&request, Some(outcome)).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome_label = match &result {
            Ok(_) => "ok",
            Err(err) => err.code(),
        };
        info!(
            request_id = %request.request_id,
            operation = %request.operation,
            duration_ms,
            outcome = outcome_label,
            "request complete"
        );

        match result {
            Ok(data) => ServiceResponse::success(request.request_id, data, request.encrypt),
            Err(err) => {
                counter!("broker_request_failures_total", "code" => err.code()).increment(1);
                let mut response =
                    ServiceResponse::failure(request.request_id, err.code(), err.to_string());
                response.encrypt = request.encrypt;
                response
            }
        }
    }

    /// Steps 1–6 of the pipeline; the caller turns the result into the
    /// envelope and emits the outcome audit event.
    async fn run(&self, request: &ServiceRequest) -> Result<Value, BrokerError> {
        // 1. Shape validation, bypassing all later steps on failure.
        if request.request_id.trim().is_empty() {
            return Err(BrokerError::Validation("requestId is required".into()));
        }
        if request.service.trim().is_empty() {
            return Err(BrokerError::Validation("service is required".into()));
        }
        if request.operation.trim().is_empty() {
            return Err(BrokerError::Validation("operation is required".into()));
        }

        // 2. Field-level decryption when flagged.
        let mut params = request.params.clone();
        if request.encrypt {
            let cipher = self.require_cipher()?;
            crypto::decrypt_params(cipher, &mut params)?;
        }

        // Request-received audit event, immediately before resolution.
        self.emit_audit(request, None).await;

        // 3–5. Resolve local-first, fall back to the health registry.
        let mut data = self.resolve_and_invoke(request, &params).await?;

        // 6. Encrypt the result when flagged.
        if request.encrypt {
            let cipher = self.require_cipher()?;
            crypto::encrypt_result(cipher, &mut data)?;
        }

        Ok(data)
    }

    async fn resolve_and_invoke(
        &self,
        request: &ServiceRequest,
        params: &std::collections::BTreeMap<String, Value>,
    ) -> Result<Value, BrokerError> {
        // Local descriptors always win.
        if let Some(descriptor) = self.operations.lookup(&request.operation) {
            let bound = descriptor.bind(params)?;
            // The handler runs on its own task so a panic unwinds there,
            // not through the dispatcher. Errors and panics are both
            // wrapped, never propagated raw.
            return match tokio::spawn(descriptor.invoke(bound)).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(BrokerError::Operation(err.to_string())),
                Err(join) if join.is_panic() => {
                    let panic = join.into_panic();
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "handler panicked".to_string());
                    Err(BrokerError::Operation(message))
                }
                Err(join) => Err(BrokerError::Internal(join.into())),
            };
        }

        // Remote fallback: best eligible registration, then one bounded call.
        let registration = self.health.find_by_operation(&request.operation)?;
        let call = self
            .invoker
            .invoke_operation(&registration.endpoint, &request.operation, params);

        let result = match tokio::time::timeout(self.invoke_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                return Err(BrokerError::Upstream {
                    status: None,
                    message: format!(
                        "remote call to `{}` timed out after {}ms",
                        registration.service_name,
                        self.invoke_timeout.as_millis()
                    ),
                });
            }
        };

        if result.success {
            Ok(result.body)
        } else {
            Err(BrokerError::Upstream {
                status: result.status_code,
                message: result
                    .error_message
                    .unwrap_or_else(|| "remote call failed".to_string()),
            })
        }
    }

    fn require_cipher(&self) -> Result<&dyn StringCipher, BrokerError> {
        self.cipher
            .as_deref()
            .ok_or_else(|| BrokerError::Decryption("no cipher configured".into()))
    }

    /// Best-effort audit emission; sink failures are logged and discarded.
    async fn emit_audit(&self, request: &ServiceRequest, outcome: Option<AuditOutcome>) {
        let event = AuditEvent {
            request_id: request.request_id.clone(),
            service: request.service.clone(),
            operation: request.operation.clone(),
            principal: None,
            param_names: request.params.keys().cloned().collect(),
            timestamp_ms: now_millis(),
            outcome,
        };
        if let Err(err) = self.audit.record(event).await {
            warn!(
                request_id = %request.request_id,
                error = %err,
                "audit sink failed; response unaffected"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
