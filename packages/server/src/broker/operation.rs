//! Local operation model: descriptors, parameter specs, and the capability
//! provider seam.
//!
//! Parameter values are `serde_json::Value` — an explicitly tagged variant
//! type. Binding a request's params to a descriptor performs an explicit
//! kind check per declared parameter and fails rather than coercing.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::error::BrokerError;

// ---------------------------------------------------------------------------
// ParamKind
// ---------------------------------------------------------------------------

/// Expected kind of a declared handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Bool,
    Object,
    Array,
    /// Any kind is accepted; presence is still enforced when required.
    Any,
}

impl ParamKind {
    /// Returns true when `value` carries this kind.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

/// Kind label of an actual JSON value, for error messages.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// ParamSpec
// ---------------------------------------------------------------------------

/// One declared parameter of a local operation.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    /// A required parameter of the given kind.
    #[must_use]
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional parameter of the given kind.
    #[must_use]
    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationDescriptor
// ---------------------------------------------------------------------------

/// Future type returned by a bound handler closure.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A handler closure bound to a specific provider instance at startup.
pub type HandlerFn = Arc<dyn Fn(BTreeMap<String, Value>) -> HandlerFuture + Send + Sync>;

/// An operation name, its declared parameters, and the callable that
/// executes it. Built once at startup; read-only thereafter.
#[derive(Clone)]
pub struct OperationDescriptor {
    pub operation_name: &'static str,
    pub params: Vec<ParamSpec>,
    handler: HandlerFn,
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("operation_name", &self.operation_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OperationDescriptor {
    /// Creates a descriptor from an async closure.
    pub fn new<F, Fut>(operation_name: &'static str, params: Vec<ParamSpec>, handler: F) -> Self
    where
        F: Fn(BTreeMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |args| Box::pin(handler(args)));
        Self {
            operation_name,
            params,
            handler,
        }
    }

    /// Binds request params to the declared parameter list.
    ///
    /// Only declared names are passed through to the handler. A missing
    /// required entry fails with `MissingParameter`; a present entry of the
    /// wrong kind fails with `ParameterType`.
    ///
    /// # Errors
    ///
    /// See above; binding never coerces values.
    pub fn bind(
        &self,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, BrokerError> {
        let mut bound = BTreeMap::new();
        for spec in &self.params {
            match params.get(spec.name) {
                Some(value) => {
                    if !spec.kind.matches(value) {
                        return Err(BrokerError::ParameterType {
                            name: spec.name.to_string(),
                            expected: spec.kind.as_str(),
                            actual: value_kind(value),
                        });
                    }
                    bound.insert(spec.name.to_string(), value.clone());
                }
                None if spec.required => {
                    return Err(BrokerError::MissingParameter {
                        name: spec.name.to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(bound)
    }

    /// Invokes the bound handler with already-bound arguments.
    pub fn invoke(&self, args: BTreeMap<String, Value>) -> HandlerFuture {
        (self.handler)(args)
    }
}

// ---------------------------------------------------------------------------
// CapabilityProvider
// ---------------------------------------------------------------------------

/// A local capability provider contributing operations at startup.
///
/// Providers are listed explicitly in the bootstrap sequence — there is no
/// runtime discovery or reflection scanning.
pub trait CapabilityProvider: Send + Sync {
    /// Provider name, used in duplicate-operation diagnostics.
    fn provider_name(&self) -> &'static str;

    /// Descriptors for every operation this provider handles.
    fn operations(&self) -> Vec<OperationDescriptor>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
