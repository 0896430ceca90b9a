//! Best-effort audit hook.
//!
//! The dispatcher emits one event immediately before handler resolution and
//! one once the outcome is known. Sink failures are logged and discarded;
//! they never alter the primary response.

use async_trait::async_trait;
use tracing::info;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Terminal outcome attached to the second audit event of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure {
        /// Stable wire code of the failure.
        code: &'static str,
    },
}

/// One audit record. Parameter values are never included — only the key
/// names — so encrypted or sensitive payloads cannot leak through the audit
/// channel.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub request_id: String,
    pub service: String,
    pub operation: String,
    /// Authenticated principal, when the hosting environment supplies one.
    pub principal: Option<String>,
    /// Names of the submitted parameters.
    pub param_names: Vec<String>,
    pub timestamp_ms: u64,
    /// `None` for the request-received event.
    pub outcome: Option<AuditOutcome>,
}

// ---------------------------------------------------------------------------
// AuditSink
// ---------------------------------------------------------------------------

/// External observer of request/response pairs.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the dispatcher recovers locally.
    async fn record(&self, event: AuditEvent) -> anyhow::Result<()>;
}

/// Default sink: structured log lines through `tracing`.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        let phase = if event.outcome.is_some() {
            "completed"
        } else {
            "received"
        };
        let outcome = match event.outcome {
            Some(AuditOutcome::Success) => "success",
            Some(AuditOutcome::Failure { code }) => code,
            None => "-",
        };
        info!(
            target: "audit",
            request_id = %event.request_id,
            service = %event.service,
            operation = %event.operation,
            principal = event.principal.as_deref().unwrap_or("-"),
            params = ?event.param_names,
            timestamp_ms = event.timestamp_ms,
            outcome,
            "audit {phase}"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_never_fails() {
        let sink = TracingAuditSink;
        let event = AuditEvent {
            request_id: "r1".to_string(),
            service: "login".to_string(),
            operation: "login".to_string(),
            principal: None,
            param_names: vec!["alias".to_string()],
            timestamp_ms: 1_000,
            outcome: Some(AuditOutcome::Success),
        };
        assert!(sink.record(event).await.is_ok());
    }
}
