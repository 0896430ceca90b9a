//! Switchboard core — wire-contract types shared by the broker server and
//! its clients.
//!
//! Everything here is transport-agnostic: request/response envelopes, the
//! service-registration record with its health status, stable error-code
//! strings, and the millisecond clock helper the health registry keys on.

pub mod codes;
pub mod envelope;
pub mod registration;
pub mod time;

pub use envelope::{ErrorEntry, ServiceRequest, ServiceResponse};
pub use registration::{HealthStatus, ServiceRegistration};
pub use time::now_millis;
