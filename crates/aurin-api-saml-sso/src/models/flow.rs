//! Self-service flow types.
//!
//! Flows are owned by their persistence stores; this crate reads them, rejects
//! the ones the SAML method cannot serve, and mutates registration UI state on
//! error before handing the flow back to its store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SamlSsoError, SamlSsoResult};
use crate::services::flow_service::Session;

/// UI node group for nodes owned by the SAML method.
pub const SAML_NODE_GROUP: &str = "saml";

/// How the flow was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Browser,
    Api,
}

/// A single renderable UI node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// Owning method group, e.g. `saml` or `default`.
    pub group: String,
    /// Input name, e.g. `csrf_token` or `traits.email`.
    pub name: String,
    /// Node kind, e.g. `input` or `submit`.
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl UiNode {
    /// The hidden CSRF input present on every browser form.
    #[must_use]
    pub fn csrf(token: &str) -> Self {
        Self {
            group: "default".to_string(),
            name: "csrf_token".to_string(),
            node_type: "input".to_string(),
            value: Some(serde_json::Value::String(token.to_string())),
        }
    }

    /// The "continue with provider" affordance appended on registration errors.
    #[must_use]
    pub fn provider_continue(provider: &str) -> Self {
        Self {
            group: SAML_NODE_GROUP.to_string(),
            name: "provider".to_string(),
            node_type: "submit".to_string(),
            value: Some(serde_json::Value::String(provider.to_string())),
        }
    }
}

/// Renderable set of named input groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiContainer {
    pub nodes: Vec<UiNode>,
}

impl UiContainer {
    /// Pre-populate `traits.*` nodes from a staged traits document.
    pub fn apply_trait_values(&mut self, traits: &serde_json::Value) {
        for node in &mut self.nodes {
            let Some(path) = node.name.strip_prefix("traits.") else {
                continue;
            };
            if let Some(value) = lookup_path(traits, path) {
                node.value = Some(value.clone());
            }
        }
    }
}

/// Navigate a dotted path through a JSON object.
fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// A login flow in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFlow {
    pub id: Uuid,
    pub execution_mode: ExecutionMode,
    pub ui: UiContainer,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A registration flow in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationFlow {
    pub id: Uuid,
    pub execution_mode: ExecutionMode,
    pub ui: UiContainer,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A settings flow in progress. Requires an active session owned by the same
/// identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFlow {
    pub id: Uuid,
    pub execution_mode: ExecutionMode,
    pub ui: UiContainer,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity_id: Uuid,
}

/// The closed set of flow variants the SAML method serves.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "flow_type", rename_all = "snake_case")]
pub enum Flow {
    Login(LoginFlow),
    Registration(RegistrationFlow),
    Settings(SettingsFlow),
}

impl Flow {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Flow::Login(f) => f.id,
            Flow::Registration(f) => f.id,
            Flow::Settings(f) => f.id,
        }
    }

    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            Flow::Login(f) => f.execution_mode,
            Flow::Registration(f) => f.execution_mode,
            Flow::Settings(f) => f.execution_mode,
        }
    }

    /// Structural and expiry validation.
    ///
    /// The session is consulted for settings flows only; login and
    /// registration flows ignore it.
    pub fn is_valid(&self, now: DateTime<Utc>, session: Option<&Session>) -> SamlSsoResult<()> {
        let expires_at = match self {
            Flow::Login(f) => f.expires_at,
            Flow::Registration(f) => f.expires_at,
            Flow::Settings(f) => f.expires_at,
        };
        if expires_at <= now {
            return Err(SamlSsoError::FlowExpiredOrInvalid {
                reason: format!("flow expired at {expires_at}"),
            });
        }

        if let Flow::Settings(f) = self {
            match session {
                Some(s) if s.identity_id == f.identity_id => {}
                _ => return Err(SamlSsoError::SessionMismatch),
            }
        }

        Ok(())
    }
}
