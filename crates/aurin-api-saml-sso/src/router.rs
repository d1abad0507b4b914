//! Router configuration for the SAML self-service method endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::error::SamlSsoResult;
use crate::handlers;
use crate::models::{
    IdentityClaims, LoginFlow, RegistrationFlow, SamlStrategyConfig, SettingsFlow,
    StrategyConfigSource, UiNode,
};
use crate::services::{ContinuityService, EngineBuilder, EngineManager, FlowService, Session};

/// SP metadata document for the default or named provider.
pub const ROUTE_METADATA: &str = "/self-service/methods/saml/metadata";
/// Browser redirect that starts an SP-initiated auth flow.
pub const ROUTE_BROWSER: &str = "/self-service/methods/saml/browser";
/// Assertion consumer service the IDP POSTs back to.
///
/// This route receives a cross-site form POST from the IDP and therefore must
/// be mounted outside any CSRF middleware; the continuation token is what
/// binds the callback to the initiating browser.
pub const ROUTE_ACS: &str = "/self-service/methods/saml/acs";

/// Interface to the identity subsystem that finishes a flow.
///
/// This keeps the SAML method decoupled from credential storage and session
/// issuance: implementations look up or create the identity for the mapped
/// claims and produce the final response (usually a redirect) themselves.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Complete a login flow for the identity holding these claims.
    async fn complete_login(
        &self,
        flow: &LoginFlow,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<axum::response::Response>;

    /// Complete a registration flow, creating the identity if needed.
    async fn complete_registration(
        &self,
        flow: &RegistrationFlow,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<axum::response::Response>;

    /// Link these claims to the session's identity via a settings flow.
    async fn complete_settings(
        &self,
        flow: &SettingsFlow,
        session: &Session,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<axum::response::Response>;
}

/// Anti-forgery token generation for rebuilt flow UIs.
pub trait CsrfProvider: Send + Sync {
    fn generate_token(&self) -> String;
}

/// Produces UI input nodes from the identity traits schema.
#[async_trait::async_trait]
pub trait SchemaProvider: Send + Sync {
    /// One input node per schema trait, named `traits.<path>`.
    async fn trait_nodes(&self) -> SamlSsoResult<Vec<UiNode>>;
}

/// Shared state for the SAML method handlers.
#[derive(Clone)]
pub struct SamlSsoState {
    /// Raw strategy configuration source, decoded per request.
    pub config_source: Arc<dyn StrategyConfigSource>,
    /// Lazily constructed per-provider engines.
    pub engines: Arc<EngineManager>,
    /// Continuation token issuance and consumption.
    pub continuity: ContinuityService,
    /// Flow stores and session lookup.
    pub flows: FlowService,
    /// Identity subsystem completing flows.
    pub identity: Arc<dyn IdentityService>,
    /// Identity schema, for rebuilding registration UIs.
    pub schema: Arc<dyn SchemaProvider>,
    /// Anti-forgery token generation.
    pub csrf: Arc<dyn CsrfProvider>,
    /// Where to send a browser that already holds a session.
    pub default_return_to: String,
}

/// Configuration for building the SAML method state.
pub struct SamlSsoConfig {
    pub config_source: Arc<dyn StrategyConfigSource>,
    pub engine_builder: Arc<dyn EngineBuilder>,
    pub continuation_secret: String,
    pub flows: FlowService,
    pub identity: Arc<dyn IdentityService>,
    pub schema: Arc<dyn SchemaProvider>,
    pub csrf: Arc<dyn CsrfProvider>,
    pub default_return_to: String,
}

impl SamlSsoState {
    #[must_use]
    pub fn new(config: SamlSsoConfig) -> Self {
        Self {
            config_source: config.config_source,
            engines: Arc::new(EngineManager::new(config.engine_builder)),
            continuity: ContinuityService::new(&config.continuation_secret),
            flows: config.flows,
            identity: config.identity,
            schema: config.schema,
            csrf: config.csrf,
            default_return_to: config.default_return_to,
        }
    }

    /// Decode the current strategy configuration.
    ///
    /// Configuration is re-read on every request so changes apply without a
    /// restart.
    pub async fn strategy_config(&self) -> SamlSsoResult<SamlStrategyConfig> {
        let raw = self.config_source.strategy_config().await?;
        SamlStrategyConfig::decode(raw)
    }
}

/// Create the SAML self-service method router.
///
/// All three routes are public: metadata and browser initiation need no
/// authentication, and the ACS endpoint authenticates via the verified
/// assertion plus the continuation cookie.
pub fn saml_sso_router() -> Router<SamlSsoState> {
    Router::new()
        .route(ROUTE_METADATA, get(handlers::metadata))
        .route(ROUTE_BROWSER, get(handlers::initiate))
        .route(ROUTE_ACS, post(handlers::acs))
}
