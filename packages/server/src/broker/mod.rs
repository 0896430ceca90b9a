//! The operation broker: local-first dispatch, remote service health, and
//! the middleware surrounding every call.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod invoker;
pub mod operation;
pub mod registry;
pub mod sweep;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
pub use config::BrokerConfig;
pub use crypto::{AesGcmCipher, StringCipher};
pub use dispatcher::Dispatcher;
pub use error::BrokerError;
pub use health::{ServiceHealthRegistry, SweepStats};
pub use invoker::{ExternalInvoker, HttpInvoker, InvocationResult};
pub use operation::{CapabilityProvider, OperationDescriptor, ParamKind, ParamSpec};
pub use registry::OperationRegistry;
pub use sweep::SweepWorker;
