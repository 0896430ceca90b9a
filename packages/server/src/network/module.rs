//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` starts accepting requests. The split lets the bootstrap wire
//! the sweep worker and demo providers between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::broker::{Dispatcher, ServiceHealthRegistry};

use super::config::NetworkConfig;
use super::handlers::{
    deregister_service_handler, find_operation_handler, get_service_handler, health_handler,
    heartbeat_handler, list_services_handler, liveness_handler, readiness_handler,
    register_service_handler, submit_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;

/// Manages the HTTP server lifecycle around the broker.
///
/// 1. `new()` -- allocates the shutdown controller and captures the broker
///    collaborators
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts requests until the shutdown future resolves,
///    then drains in-flight requests
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    dispatcher: Arc<Dispatcher>,
    health: Arc<ServiceHealthRegistry>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        dispatcher: Arc<Dispatcher>,
        health: Arc<ServiceHealthRegistry>,
    ) -> Self {
        Self {
            config,
            listener: None,
            dispatcher,
            health,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared shutdown controller, for modules that need to observe or
    /// trigger shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /requests` -- broker submission
    /// - `GET  /registry/services` / `POST /registry/services`
    /// - `GET  /registry/services/{name}` / `DELETE /registry/services/{name}`
    /// - `GET  /registry/operations/{operation}`
    /// - `POST /registry/heartbeat/{name}`
    /// - `GET  /health`, `/health/live`, `/health/ready`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            health: Arc::clone(&self.health),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/requests", post(submit_handler))
            .route(
                "/registry/services",
                get(list_services_handler).post(register_service_handler),
            )
            .route(
                "/registry/services/{name}",
                get(get_service_handler).delete(deregister_service_handler),
            )
            .route(
                "/registry/operations/{operation}",
                get(find_operation_handler),
            )
            .route("/registry/heartbeat/{name}", post(heartbeat_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 requests an OS-assigned port.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until the shutdown future resolves, then drains.
    ///
    /// After the shutdown signal the health state moves to Draining and the
    /// module waits up to 30 seconds for in-flight requests to finish.
    ///
    /// # Errors
    ///
    /// Propagates fatal I/O errors from the server.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .expect("start() must be called before serve()");

        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.shutdown);

        // Readiness probes pass from here on.
        shutdown_ctrl.set_ready();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        drain(&shutdown_ctrl).await;
        Ok(())
    }
}

/// Transitions to Draining and waits for in-flight requests to finish.
async fn drain(shutdown_ctrl: &ShutdownController) {
    shutdown_ctrl.trigger_shutdown();

    let drained = shutdown_ctrl.wait_for_drain(Duration::from_secs(30)).await;
    if drained {
        info!("all in-flight requests drained");
    } else {
        warn!("drain timeout expired with in-flight requests remaining");
    }
}
