//! Operation registry: local handler descriptors, built once at startup.
//!
//! The registry is assembled from an explicit bootstrap list of capability
//! providers. It is immutable after construction, so lookups are pure reads
//! that need no synchronization and are safe for unlimited concurrent
//! callers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;

use super::operation::{CapabilityProvider, OperationDescriptor};

/// Immutable-after-init table mapping operation names to local descriptors.
#[derive(Debug)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, OperationDescriptor>,
}

impl OperationRegistry {
    /// Builds the registry by scanning the given providers in order.
    ///
    /// # Errors
    ///
    /// Fails fast when two descriptors claim the same operation name. This
    /// is a configuration error: the process must not start.
    pub fn from_providers(providers: &[Arc<dyn CapabilityProvider>]) -> anyhow::Result<Self> {
        let mut operations: HashMap<&'static str, OperationDescriptor> = HashMap::new();
        let mut owners: HashMap<&'static str, &'static str> = HashMap::new();

        for provider in providers {
            for descriptor in provider.operations() {
                let name = descriptor.operation_name;
                if let Some(previous) = owners.get(name) {
                    bail!(
                        "duplicate operation `{name}`: claimed by both `{previous}` and `{}`",
                        provider.provider_name()
                    );
                }
                owners.insert(name, provider.provider_name());
                operations.insert(name, descriptor);
            }
        }

        Ok(Self { operations })
    }

    /// An empty registry. Useful for servers that route everything remotely.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Pure read: the descriptor for `operation_name`, if locally handled.
    #[must_use]
    pub fn lookup(&self, operation_name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(operation_name)
    }

    /// Number of registered local operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::broker::operation::{ParamKind, ParamSpec};

    struct FixedProvider {
        name: &'static str,
        ops: Vec<&'static str>,
    }

    impl CapabilityProvider for FixedProvider {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        fn operations(&self) -> Vec<OperationDescriptor> {
            self.ops
                .iter()
                .map(|op| {
                    OperationDescriptor::new(
                        op,
                        vec![ParamSpec::optional("input", ParamKind::Any)],
                        |_args| async move { Ok(json!(null)) },
                    )
                })
                .collect()
        }
    }

    #[test]
    fn builds_from_multiple_providers() {
        let providers: Vec<Arc<dyn CapabilityProvider>> = vec![
            Arc::new(FixedProvider {
                name: "auth",
                ops: vec!["login", "logout"],
            }),
            Arc::new(FixedProvider {
                name: "export",
                ops: vec!["export"],
            }),
        ];

        let registry = OperationRegistry::from_providers(&providers).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.lookup("login").is_some());
        assert!(registry.lookup("export").is_some());
    }

    #[test]
    fn lookup_unknown_returns_none() {
        let registry = OperationRegistry::empty();
        assert!(registry.lookup("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_operation_fails_startup() {
        let providers: Vec<Arc<dyn CapabilityProvider>> = vec![
            Arc::new(FixedProvider {
                name: "auth",
                ops: vec!["login"],
            }),
            Arc::new(FixedProvider {
                name: "sso",
                ops: vec!["login"],
            }),
        ];

        let err = OperationRegistry::from_providers(&providers).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("login"));
        assert!(text.contains("auth"));
        assert!(text.contains("sso"));
    }
}
