//! Switchboard server — operation broker with a service health registry and
//! an axum HTTP surface.

pub mod broker;
pub mod network;
pub mod providers;
