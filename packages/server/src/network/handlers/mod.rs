//! axum handlers for the broker surface.
//!
//! Defines `AppState` (the shared state carried through axum extractors)
//! and re-exports all handler functions for the router.

pub mod broker;
pub mod health;

pub use broker::{
    deregister_service_handler, find_operation_handler, get_service_handler, heartbeat_handler,
    list_services_handler, register_service_handler, submit_handler,
};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use crate::broker::{Dispatcher, ServiceHealthRegistry};

use super::{NetworkConfig, ShutdownController};

/// Shared application state passed to all handlers via `State` extraction.
/// All fields are `Arc`s, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The operation dispatcher behind `POST /requests`.
    pub dispatcher: Arc<Dispatcher>,
    /// Remote service registrations, exposed through the registry routes.
    pub health: Arc<ServiceHealthRegistry>,
    /// Graceful shutdown controller with in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration.
    pub config: Arc<NetworkConfig>,
    /// Process start time, for uptime reporting.
    pub start_time: Instant,
}
