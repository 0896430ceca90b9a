//! Broker submission and registry handlers.
//!
//! `POST /requests` always answers 200 with a response envelope; failures
//! ride inside the envelope. The registry routes are plain REST and do map
//! broker errors onto HTTP status codes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use switchboard_core::{now_millis, ServiceRegistration, ServiceRequest, ServiceResponse};

use crate::broker::BrokerError;

use super::AppState;

/// Broker error carried out of a registry handler.
#[derive(Debug)]
pub struct ApiError(BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::Validation(_) => StatusCode::BAD_REQUEST,
            BrokerError::NotFound { .. } => StatusCode::NOT_FOUND,
            BrokerError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

/// `POST /requests` -- submits one operation request to the dispatcher.
///
/// Always 200: transport status reflects only whether the broker answered,
/// never whether the operation succeeded.
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(request): Json<ServiceRequest>,
) -> Json<ServiceResponse> {
    let _guard = state.shutdown.in_flight_guard();
    Json(state.dispatcher.submit(request).await)
}

/// `POST /registry/services` -- registers or replaces a remote service.
pub async fn register_service_handler(
    State(state): State<AppState>,
    Json(registration): Json<ServiceRegistration>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let name = registration.service_name.clone();
    state.health.register(registration, now_millis())?;
    Ok((StatusCode::CREATED, Json(json!({ "serviceName": name }))))
}

/// `GET /registry/services` -- lists all registrations, sorted by name.
pub async fn list_services_handler(
    State(state): State<AppState>,
) -> Json<Vec<ServiceRegistration>> {
    Json(state.health.snapshot())
}

/// `GET /registry/services/{name}` -- one registration by name.
pub async fn get_service_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceRegistration>, ApiError> {
    Ok(Json(state.health.find_by_service_name(&name)?))
}

/// `DELETE /registry/services/{name}` -- removes a registration immediately.
pub async fn deregister_service_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.health.deregister(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /registry/heartbeat/{name}` -- records a liveness signal.
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.health.heartbeat(&name, now_millis())?;
    Ok(Json(json!({
        "serviceName": name,
        "status": status,
    })))
}

/// `GET /registry/operations/{operation}` -- the registration the broker
/// would currently route this operation to.
pub async fn find_operation_handler(
    State(state): State<AppState>,
    Path(operation): Path<String>,
) -> Result<Json<ServiceRegistration>, ApiError> {
    let registration = state.health.find_by_operation(&operation)?;
    Ok(Json(registration))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use serde_json::{json, Value};

    use switchboard_core::codes;

    use super::*;
    use crate::broker::{
        AuditSink, BrokerConfig, CapabilityProvider, Dispatcher, ExternalInvoker, HttpInvoker,
        OperationDescriptor, OperationRegistry, ParamKind, ParamSpec, ServiceHealthRegistry,
        TracingAuditSink,
    };
    use crate::network::{NetworkConfig, ShutdownController};

    struct EchoProvider;

    impl CapabilityProvider for EchoProvider {
        fn provider_name(&self) -> &'static str {
            "echo"
        }

        fn operations(&self) -> Vec<OperationDescriptor> {
            vec![OperationDescriptor::new(
                "echo",
                vec![ParamSpec::required("text", ParamKind::String)],
                |args| async move { Ok(json!({ "echoed": args["text"] })) },
            )]
        }
    }

    fn test_state() -> AppState {
        let providers: Vec<Arc<dyn CapabilityProvider>> = vec![Arc::new(EchoProvider)];
        let operations = Arc::new(OperationRegistry::from_providers(&providers).unwrap());
        let health = Arc::new(ServiceHealthRegistry::new(30_000, 120_000));
        let invoker: Arc<dyn ExternalInvoker> = Arc::new(
            HttpInvoker::new(Duration::from_millis(200), Duration::from_millis(100)).unwrap(),
        );
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        let dispatcher = Arc::new(Dispatcher::new(
            operations,
            Arc::clone(&health),
            invoker,
            audit,
            None,
            &BrokerConfig::default(),
        ));
        AppState {
            dispatcher,
            health,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    fn registration(name: &str, ops: &[&str]) -> ServiceRegistration {
        ServiceRegistration {
            service_name: name.to_string(),
            operations: ops.iter().map(ToString::to_string).collect(),
            endpoint: format!("http://{name}/api"),
            health_check: format!("http://{name}/health"),
            metadata: BTreeMap::new(),
            last_heartbeat: 0,
            status: switchboard_core::HealthStatus::UNKNOWN,
        }
    }

    #[tokio::test]
    async fn submit_answers_envelope_for_local_operation() {
        let state = test_state();
        let mut params = BTreeMap::new();
        params.insert("text".to_string(), json!("hi"));
        let request = ServiceRequest {
            request_id: "r1".to_string(),
            service: "echo".to_string(),
            operation: "echo".to_string(),
            params,
            encrypt: false,
        };

        let response = submit_handler(State(state), Json(request)).await;
        assert!(response.0.ok);
        assert_eq!(response.0.request_id, "r1");
        assert_eq!(response.0.data["echoed"], json!("hi"));
    }

    #[tokio::test]
    async fn submit_answers_envelope_even_on_failure() {
        let state = test_state();
        let request = ServiceRequest {
            request_id: "r2".to_string(),
            service: "nope".to_string(),
            operation: "nope".to_string(),
            params: BTreeMap::new(),
            encrypt: false,
        };

        // No Result: the handler cannot fail at the HTTP level.
        let response = submit_handler(State(state), Json(request)).await;
        assert!(!response.0.ok);
        assert_eq!(response.0.errors[0].code, codes::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn register_then_list_then_deregister() {
        let state = test_state();

        let (status, body) = register_service_handler(
            State(state.clone()),
            Json(registration("export-service", &["export"])),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.0["serviceName"], "export-service");

        let listed = list_services_handler(State(state.clone())).await;
        assert_eq!(listed.0.len(), 1);

        let status =
            deregister_service_handler(State(state.clone()), Path("export-service".to_string()))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let listed = list_services_handler(State(state)).await;
        assert!(listed.0.is_empty());
    }

    #[tokio::test]
    async fn register_invalid_payload_is_bad_request() {
        let state = test_state();
        let mut bad = registration("bad", &["op"]);
        bad.endpoint = String::new();

        let err = register_service_handler(State(state), Json(bad))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_service_by_name() {
        let state = test_state();
        state
            .health
            .register(registration("s1", &["op"]), now_millis())
            .unwrap();

        let body = get_service_handler(State(state.clone()), Path("s1".to_string()))
            .await
            .unwrap();
        assert_eq!(body.0.service_name, "s1");

        let err = get_service_handler(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn heartbeat_unknown_service_is_not_found() {
        let state = test_state();
        let err = heartbeat_handler(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn heartbeat_reports_restored_status() {
        let state = test_state();
        state
            .health
            .register(registration("s1", &["op"]), now_millis())
            .unwrap();

        let body = heartbeat_handler(State(state), Path("s1".to_string()))
            .await
            .unwrap();
        assert_eq!(body.0["status"], "HEALTHY");
    }

    #[tokio::test]
    async fn find_operation_maps_unresolvable_to_503() {
        let state = test_state();
        let err = find_operation_handler(State(state), Path("nothing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn find_operation_returns_routed_registration() {
        let state = test_state();
        state
            .health
            .register(registration("export-service", &["export"]), now_millis())
            .unwrap();

        let body = find_operation_handler(State(state), Path("export".to_string()))
            .await
            .unwrap();
        assert_eq!(body.0.service_name, "export-service");
    }

    #[test]
    fn api_error_body_carries_code_and_message() {
        let err = ApiError(BrokerError::NotFound {
            name: "ghost".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn heartbeat_status_serializes_upper_case() {
        // Wire form of the status enum used in the heartbeat body.
        let value: Value = serde_json::to_value(switchboard_core::HealthStatus::HEALTHY).unwrap();
        assert_eq!(value, json!("HEALTHY"));
    }
}
