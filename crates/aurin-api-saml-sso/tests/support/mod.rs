//! Shared test harness: a fully wired router with mock collaborators.
//!
//! The mock engine treats the `SAMLResponse` form value as a JSON-encoded
//! [`ParsedAssertion`], standing in for the XML decoding a real engine does
//! after signature verification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use aurin_api_saml_sso::models::{
    AcsForm, AssertionAttribute, AttributeStatement, ExecutionMode, IdentityClaims, LoginFlow,
    ParsedAssertion, RegistrationFlow, SettingsFlow, StrategyConfigSource, UiContainer, UiNode,
};
use aurin_api_saml_sso::services::{
    EngineBuilder, LoginFlowStore, RegistrationFlowStore, SamlEngine, Session, SessionManager,
    SettingsFlowStore, SsoRedirect,
};
use aurin_api_saml_sso::{
    saml_sso_router, CsrfProvider, IdentityService, SamlSsoConfig, SamlSsoError, SamlSsoResult,
    SamlSsoState, SchemaProvider,
};

pub const IDP_SSO_URL: &str = "https://idp.example.com/sso?SAMLRequest=encoded";
pub const REQUEST_ID: &str = "request-1";
pub const DEFAULT_RETURN_TO: &str = "https://app.example.com/";

pub struct MockEngine {
    tracked: Vec<String>,
}

#[async_trait::async_trait]
impl SamlEngine for MockEngine {
    async fn parse_response(
        &self,
        form: &AcsForm,
        accepted_request_ids: &[String],
    ) -> SamlSsoResult<ParsedAssertion> {
        let assertion: ParsedAssertion =
            serde_json::from_str(&form.saml_response).map_err(|_| SamlSsoError::Protocol {
                reason: "response is not a valid assertion".to_string(),
            })?;

        let in_response_to = assertion.in_response_to.clone().unwrap_or_default();
        if !accepted_request_ids.iter().any(|id| *id == in_response_to) {
            return Err(SamlSsoError::Protocol {
                reason: "InResponseTo does not match any outstanding request".to_string(),
            });
        }

        Ok(assertion)
    }

    async fn tracked_request_ids(&self, _headers: &HeaderMap) -> Vec<String> {
        self.tracked.clone()
    }

    async fn serve_metadata(&self) -> SamlSsoResult<Response> {
        Ok((
            [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
            "<EntityDescriptor/>",
        )
            .into_response())
    }

    async fn initiate(&self, _return_to: Option<&str>) -> SamlSsoResult<SsoRedirect> {
        Ok(SsoRedirect {
            redirect_url: IDP_SSO_URL.to_string(),
            request_id: REQUEST_ID.to_string(),
        })
    }
}

struct MockEngineBuilder;

#[async_trait::async_trait]
impl EngineBuilder for MockEngineBuilder {
    async fn build(
        &self,
        _config: &aurin_api_saml_sso::models::ProviderConfiguration,
    ) -> SamlSsoResult<Arc<dyn SamlEngine>> {
        Ok(Arc::new(MockEngine {
            tracked: vec![REQUEST_ID.to_string()],
        }))
    }
}

#[derive(Default)]
pub struct InMemoryStores {
    pub registration: Mutex<HashMap<Uuid, RegistrationFlow>>,
    pub login: Mutex<HashMap<Uuid, LoginFlow>>,
    pub settings: Mutex<HashMap<Uuid, SettingsFlow>>,
}

#[async_trait::async_trait]
impl LoginFlowStore for InMemoryStores {
    async fn get_login_flow(&self, id: Uuid) -> SamlSsoResult<LoginFlow> {
        self.login
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SamlSsoError::FlowNotFound)
    }
}

#[async_trait::async_trait]
impl RegistrationFlowStore for InMemoryStores {
    async fn get_registration_flow(&self, id: Uuid) -> SamlSsoResult<RegistrationFlow> {
        self.registration
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SamlSsoError::FlowNotFound)
    }

    async fn update_registration_flow(&self, flow: RegistrationFlow) -> SamlSsoResult<()> {
        self.registration.lock().unwrap().insert(flow.id, flow);
        Ok(())
    }

    async fn create_idp_initiated_flow(&self) -> SamlSsoResult<RegistrationFlow> {
        let flow = RegistrationFlow {
            id: Uuid::new_v4(),
            execution_mode: ExecutionMode::Browser,
            ui: UiContainer::default(),
            csrf_token: "csrf-initial".to_string(),
            expires_at: Utc::now() + Duration::minutes(30),
        };
        self.registration
            .lock()
            .unwrap()
            .insert(flow.id, flow.clone());
        Ok(flow)
    }
}

#[async_trait::async_trait]
impl SettingsFlowStore for InMemoryStores {
    async fn get_settings_flow(&self, id: Uuid) -> SamlSsoResult<SettingsFlow> {
        self.settings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SamlSsoError::FlowNotFound)
    }
}

pub struct FixedSession(pub Option<Session>);

#[async_trait::async_trait]
impl SessionManager for FixedSession {
    async fn session_from_request(&self, _headers: &HeaderMap) -> SamlSsoResult<Option<Session>> {
        Ok(self.0.clone())
    }
}

/// Records completion calls; optionally fails them.
#[derive(Default)]
pub struct RecordingIdentity {
    pub completions: Mutex<Vec<String>>,
    pub fail_registration: bool,
}

#[async_trait::async_trait]
impl IdentityService for RecordingIdentity {
    async fn complete_login(
        &self,
        flow: &LoginFlow,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<Response> {
        self.completions
            .lock()
            .unwrap()
            .push(format!("login:{}:{}:{}", flow.id, provider, claims.subject));
        Ok((StatusCode::OK, format!("login-completed:{}", claims.subject)).into_response())
    }

    async fn complete_registration(
        &self,
        flow: &RegistrationFlow,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<Response> {
        if self.fail_registration {
            return Err(SamlSsoError::Internal {
                message: "identity creation failed".to_string(),
            });
        }
        self.completions.lock().unwrap().push(format!(
            "registration:{}:{}:{}",
            flow.id, provider, claims.subject
        ));
        Ok((
            StatusCode::OK,
            format!("registration-completed:{}", claims.subject),
        )
            .into_response())
    }

    async fn complete_settings(
        &self,
        flow: &SettingsFlow,
        session: &Session,
        provider: &str,
        claims: &IdentityClaims,
    ) -> SamlSsoResult<Response> {
        self.completions.lock().unwrap().push(format!(
            "settings:{}:{}:{}:{}",
            flow.id, session.identity_id, provider, claims.subject
        ));
        Ok((
            StatusCode::OK,
            format!("settings-completed:{}", claims.subject),
        )
            .into_response())
    }
}

struct StaticConfigSource {
    allow_idp_initiated: bool,
}

#[async_trait::async_trait]
impl StrategyConfigSource for StaticConfigSource {
    async fn strategy_config(&self) -> SamlSsoResult<serde_json::Value> {
        Ok(json!({
            "providers": [{
                "id": "corp-idp",
                "label": "Corporate IDP",
                "idp_metadata_url": "https://idp.example.com/metadata",
                "public_cert_path": "/etc/aurin/sp.crt",
                "private_key_path": "/etc/aurin/sp.key",
                "allow_idp_initiated": self.allow_idp_initiated,
                "mapper": {
                    "subject_source": "email",
                    "traits": [
                        {"claim": "email", "trait_path": "email", "required": true},
                        {"claim": "givenName", "trait_path": "name.first"}
                    ]
                }
            }]
        }))
    }
}

struct CountingCsrf(AtomicUsize);

impl CsrfProvider for CountingCsrf {
    fn generate_token(&self) -> String {
        format!("csrf-rotated-{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

struct EmailSchema;

#[async_trait::async_trait]
impl SchemaProvider for EmailSchema {
    async fn trait_nodes(&self) -> SamlSsoResult<Vec<UiNode>> {
        Ok(vec![
            UiNode {
                group: "saml".to_string(),
                name: "traits.email".to_string(),
                node_type: "input".to_string(),
                value: None,
            },
            UiNode {
                group: "saml".to_string(),
                name: "traits.name.first".to_string(),
                node_type: "input".to_string(),
                value: None,
            },
        ])
    }
}

pub struct Harness {
    pub stores: Arc<InMemoryStores>,
    pub identity: Arc<RecordingIdentity>,
    pub state: SamlSsoState,
}

pub struct HarnessOptions {
    pub allow_idp_initiated: bool,
    pub session: Option<Session>,
    pub fail_registration: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            allow_idp_initiated: false,
            session: None,
            fail_registration: false,
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let stores = Arc::new(InMemoryStores::default());
    let identity = Arc::new(RecordingIdentity {
        completions: Mutex::new(Vec::new()),
        fail_registration: options.fail_registration,
    });

    let state = SamlSsoState::new(SamlSsoConfig {
        config_source: Arc::new(StaticConfigSource {
            allow_idp_initiated: options.allow_idp_initiated,
        }),
        engine_builder: Arc::new(MockEngineBuilder),
        continuation_secret: "integration-test-continuation-secret".to_string(),
        flows: aurin_api_saml_sso::services::FlowService {
            registration: stores.clone(),
            login: stores.clone(),
            settings: stores.clone(),
            sessions: Arc::new(FixedSession(options.session)),
        },
        identity: identity.clone(),
        schema: Arc::new(EmailSchema),
        csrf: Arc::new(CountingCsrf(AtomicUsize::new(0))),
        default_return_to: DEFAULT_RETURN_TO.to_string(),
    });

    Harness {
        stores,
        identity,
        state,
    }
}

impl Harness {
    pub fn app(&self) -> Router {
        Router::new()
            .merge(saml_sso_router())
            .with_state(self.state.clone())
    }

    pub fn insert_login_flow(&self, mode: ExecutionMode, expires_in: Duration) -> LoginFlow {
        let flow = LoginFlow {
            id: Uuid::new_v4(),
            execution_mode: mode,
            ui: UiContainer::default(),
            csrf_token: "csrf-initial".to_string(),
            expires_at: Utc::now() + expires_in,
        };
        self.stores
            .login
            .lock()
            .unwrap()
            .insert(flow.id, flow.clone());
        flow
    }

    pub fn insert_registration_flow(&self) -> RegistrationFlow {
        let flow = RegistrationFlow {
            id: Uuid::new_v4(),
            execution_mode: ExecutionMode::Browser,
            ui: UiContainer {
                nodes: vec![UiNode::csrf("csrf-initial")],
            },
            csrf_token: "csrf-initial".to_string(),
            expires_at: Utc::now() + Duration::minutes(30),
        };
        self.stores
            .registration
            .lock()
            .unwrap()
            .insert(flow.id, flow.clone());
        flow
    }

    pub fn insert_settings_flow(&self, identity_id: Uuid) -> SettingsFlow {
        let flow = SettingsFlow {
            id: Uuid::new_v4(),
            execution_mode: ExecutionMode::Browser,
            ui: UiContainer::default(),
            csrf_token: "csrf-initial".to_string(),
            expires_at: Utc::now() + Duration::minutes(30),
            identity_id,
        };
        self.stores
            .settings
            .lock()
            .unwrap()
            .insert(flow.id, flow.clone());
        flow
    }
}

/// Drive the browser initiation endpoint and return the continuation cookie.
pub async fn initiate_and_capture_cookie(harness: &Harness, flow_id: Uuid) -> String {
    initiate_and_capture_cookie_with_traits(harness, flow_id, None).await
}

pub async fn initiate_and_capture_cookie_with_traits(
    harness: &Harness,
    flow_id: Uuid,
    traits: Option<&str>,
) -> String {
    let mut uri = format!("/self-service/methods/saml/browser?flow={flow_id}");
    if let Some(traits) = traits {
        uri.push_str("&traits=");
        uri.push_str(
            &url::form_urlencoded::byte_serialize(traits.as_bytes()).collect::<String>(),
        );
    }

    let response = harness
        .app()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("initiation sets the continuation cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .expect("cookie name=value pair")
        .to_string()
}

/// The assertion an IDP would send for a successfully authenticated user.
pub fn assertion_for(email: &str, in_response_to: Option<&str>) -> ParsedAssertion {
    ParsedAssertion {
        in_response_to: in_response_to.map(str::to_string),
        attribute_statements: vec![AttributeStatement {
            attributes: vec![
                AssertionAttribute {
                    name: "urn:oid:0.9.2342.19200300.100.1.3".to_string(),
                    friendly_name: Some("email".to_string()),
                    values: vec![email.to_string()],
                },
                AssertionAttribute {
                    name: "givenName".to_string(),
                    friendly_name: None,
                    values: vec!["Alice".to_string()],
                },
            ],
        }],
    }
}

/// POST the assertion to the ACS endpoint, optionally with a cookie and query.
pub async fn post_acs(
    harness: &Harness,
    assertion: &ParsedAssertion,
    cookie: Option<&str>,
    query: Option<&str>,
) -> Response<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("SAMLResponse", &serde_json::to_string(assertion).unwrap())
        .finish();

    let uri = match query {
        Some(query) => format!("/self-service/methods/saml/acs?{query}"),
        None => "/self-service/methods/saml/acs".to_string(),
    };

    let mut request = Request::post(uri).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    harness
        .app()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
