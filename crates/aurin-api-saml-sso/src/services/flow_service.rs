//! Flow resolution and validation across the three self-service stores.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{SamlSsoError, SamlSsoResult};
use crate::models::{ExecutionMode, Flow, LoginFlow, RegistrationFlow, SettingsFlow};

/// An active end-user session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: Uuid,
}

/// Login flow persistence, owned by the login subsystem.
#[async_trait::async_trait]
pub trait LoginFlowStore: Send + Sync {
    async fn get_login_flow(&self, id: Uuid) -> SamlSsoResult<LoginFlow>;
}

/// Registration flow persistence, owned by the registration subsystem.
///
/// The SAML method additionally needs to persist UI mutations on error and to
/// mint fresh flows for IDP-initiated assertions.
#[async_trait::async_trait]
pub trait RegistrationFlowStore: Send + Sync {
    async fn get_registration_flow(&self, id: Uuid) -> SamlSsoResult<RegistrationFlow>;
    async fn update_registration_flow(&self, flow: RegistrationFlow) -> SamlSsoResult<()>;
    async fn create_idp_initiated_flow(&self) -> SamlSsoResult<RegistrationFlow>;
}

/// Settings flow persistence, owned by the settings subsystem.
#[async_trait::async_trait]
pub trait SettingsFlowStore: Send + Sync {
    async fn get_settings_flow(&self, id: Uuid) -> SamlSsoResult<SettingsFlow>;
}

/// Session lookup for the current request.
#[async_trait::async_trait]
pub trait SessionManager: Send + Sync {
    /// The active session bound to this request, if any.
    async fn session_from_request(&self, headers: &HeaderMap) -> SamlSsoResult<Option<Session>>;
}

/// Resolves a flow id to its owning store and validates the result.
#[derive(Clone)]
pub struct FlowService {
    pub registration: Arc<dyn RegistrationFlowStore>,
    pub login: Arc<dyn LoginFlowStore>,
    pub settings: Arc<dyn SettingsFlowStore>,
    pub sessions: Arc<dyn SessionManager>,
}

impl FlowService {
    /// Probe the three stores in a fixed order and return the first hit.
    ///
    /// Flow IDs are globally unique, so probe order never changes which flow
    /// is returned. When no store holds the id, the error of the last store
    /// probed is returned; callers must not infer a flow type from it.
    pub async fn resolve(&self, flow_id: Uuid) -> SamlSsoResult<Flow> {
        if flow_id.is_nil() {
            return Err(SamlSsoError::Correlation {
                reason: "flow identifier is empty".to_string(),
            });
        }

        if let Ok(flow) = self.registration.get_registration_flow(flow_id).await {
            debug!(flow_id = %flow_id, "Resolved registration flow");
            return Ok(Flow::Registration(flow));
        }
        if let Ok(flow) = self.login.get_login_flow(flow_id).await {
            debug!(flow_id = %flow_id, "Resolved login flow");
            return Ok(Flow::Login(flow));
        }
        match self.settings.get_settings_flow(flow_id).await {
            Ok(flow) => {
                debug!(flow_id = %flow_id, "Resolved settings flow");
                Ok(Flow::Settings(flow))
            }
            Err(err) => Err(err),
        }
    }

    /// Validate that the SAML method may drive this flow.
    ///
    /// Non-browser flows are rejected outright. Settings flows require an
    /// active session owned by the same identity; the session is threaded into
    /// the flow's own validity check for settings flows only.
    pub async fn validate(&self, flow: &Flow, headers: &HeaderMap) -> SamlSsoResult<Option<Session>> {
        if flow.execution_mode() != ExecutionMode::Browser {
            return Err(SamlSsoError::ApiFlowNotSupported);
        }

        let session = match flow {
            Flow::Settings(_) => {
                let session = self
                    .sessions
                    .session_from_request(headers)
                    .await?
                    .ok_or(SamlSsoError::SessionMismatch)?;
                Some(session)
            }
            _ => None,
        };

        flow.is_valid(Utc::now(), session.as_ref())?;
        Ok(session)
    }
}
