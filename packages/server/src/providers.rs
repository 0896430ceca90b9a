//! Demo capability providers bundled with the server binary.
//!
//! These make a fresh install runnable end to end: `login` issues a session
//! token against a fixed demo account table, and `echo` reflects its input.
//! Production deployments replace these with their own providers in the
//! bootstrap list.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use uuid::Uuid;

use crate::broker::{CapabilityProvider, OperationDescriptor, ParamKind, ParamSpec};

// ---------------------------------------------------------------------------
// LoginProvider
// ---------------------------------------------------------------------------

/// Issues demo session tokens for a fixed alias/identifier table.
pub struct LoginProvider {
    accounts: Arc<BTreeMap<String, String>>,
}

impl LoginProvider {
    /// Provider with the built-in demo accounts (`admin`, `operator`).
    #[must_use]
    pub fn with_demo_accounts() -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert("admin".to_string(), "admin-identifier".to_string());
        accounts.insert("operator".to_string(), "operator-identifier".to_string());
        Self {
            accounts: Arc::new(accounts),
        }
    }

    /// Provider with a caller-supplied account table.
    #[must_use]
    pub fn with_accounts(accounts: BTreeMap<String, String>) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }
}

impl CapabilityProvider for LoginProvider {
    fn provider_name(&self) -> &'static str {
        "login"
    }

    fn operations(&self) -> Vec<OperationDescriptor> {
        let accounts = Arc::clone(&self.accounts);
        vec![OperationDescriptor::new(
            "login",
            vec![
                ParamSpec::required("alias", ParamKind::String),
                ParamSpec::required("identifier", ParamKind::String),
            ],
            move |args| {
                let accounts = Arc::clone(&accounts);
                async move {
                    // Binding guarantees both args are strings.
                    let alias = args["alias"].as_str().unwrap_or_default();
                    let identifier = args["identifier"].as_str().unwrap_or_default();
                    match accounts.get(alias) {
                        Some(expected) if expected == identifier => Ok(json!({
                            "token": Uuid::new_v4().to_string(),
                            "alias": alias,
                        })),
                        _ => Err(anyhow!("invalid credentials")),
                    }
                }
            },
        )]
    }
}

// ---------------------------------------------------------------------------
// EchoProvider
// ---------------------------------------------------------------------------

/// Reflects its input, optionally repeated.
pub struct EchoProvider;

impl CapabilityProvider for EchoProvider {
    fn provider_name(&self) -> &'static str {
        "echo"
    }

    fn operations(&self) -> Vec<OperationDescriptor> {
        vec![OperationDescriptor::new(
            "echo",
            vec![
                ParamSpec::required("text", ParamKind::String),
                ParamSpec::optional("repeat", ParamKind::Number),
            ],
            |args| async move {
                let text = args["text"].as_str().unwrap_or_default();
                let repeat = args
                    .get("repeat")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(1);
                let repeat = usize::try_from(repeat.min(1_000)).unwrap_or(1);
                Ok(json!({ "echoed": text.repeat(repeat) }))
            },
        )]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_of(provider: &dyn CapabilityProvider, name: &str) -> OperationDescriptor {
        provider
            .operations()
            .into_iter()
            .find(|d| d.operation_name == name)
            .expect("operation must exist")
    }

    #[tokio::test]
    async fn login_accepts_demo_account() {
        let provider = LoginProvider::with_demo_accounts();
        let desc = descriptor_of(&provider, "login");

        let mut params = BTreeMap::new();
        params.insert("alias".to_string(), json!("admin"));
        params.insert("identifier".to_string(), json!("admin-identifier"));

        let bound = desc.bind(&params).unwrap();
        let result = desc.invoke(bound).await.unwrap();
        assert_eq!(result["alias"], json!("admin"));
        assert!(result["token"].as_str().unwrap().len() > 10);
    }

    #[tokio::test]
    async fn login_rejects_wrong_identifier() {
        let provider = LoginProvider::with_demo_accounts();
        let desc = descriptor_of(&provider, "login");

        let mut params = BTreeMap::new();
        params.insert("alias".to_string(), json!("admin"));
        params.insert("identifier".to_string(), json!("nope"));

        let bound = desc.bind(&params).unwrap();
        let err = desc.invoke(bound).await.unwrap_err();
        assert!(err.to_string().contains("invalid credentials"));
    }

    #[tokio::test]
    async fn login_rejects_unknown_alias() {
        let provider = LoginProvider::with_accounts(BTreeMap::new());
        let desc = descriptor_of(&provider, "login");

        let mut params = BTreeMap::new();
        params.insert("alias".to_string(), json!("ghost"));
        params.insert("identifier".to_string(), json!("x"));

        let bound = desc.bind(&params).unwrap();
        assert!(desc.invoke(bound).await.is_err());
    }

    #[tokio::test]
    async fn echo_reflects_text() {
        let desc = descriptor_of(&EchoProvider, "echo");

        let mut params = BTreeMap::new();
        params.insert("text".to_string(), json!("hi"));

        let bound = desc.bind(&params).unwrap();
        let result = desc.invoke(bound).await.unwrap();
        assert_eq!(result["echoed"], json!("hi"));
    }

    #[tokio::test]
    async fn echo_honors_repeat() {
        let desc = descriptor_of(&EchoProvider, "echo");

        let mut params = BTreeMap::new();
        params.insert("text".to_string(), json!("ab"));
        params.insert("repeat".to_string(), json!(3));

        let bound = desc.bind(&params).unwrap();
        let result = desc.invoke(bound).await.unwrap();
        assert_eq!(result["echoed"], json!("ababab"));
    }
}
