//! Callback dispatch: correlating the IDP callback with its pending flow and
//! routing the mapped claims to the flow-typed completion or error path.
//!
//! The state machine is `AwaitingCallback -> AssertionParsed -> ClaimsMapped
//! -> {Completed | Errored}`. Continuation consumption happens after parsing
//! and claims mapping, so assertion- and mapping-level failures are
//! necessarily flow-agnostic. That ordering is part of the contract, not an
//! accident: flow context only exists once the continuation has been consumed.
//!
//! Every failure is reported exactly once, through [`render_flow_error`].

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};

use crate::error::{SamlSsoError, SamlSsoResult};
use crate::models::{AcsForm, AcsQuery, Flow, RegistrationFlow, UiNode};
use crate::router::SamlSsoState;
use crate::saml::{accepted_request_ids, extract_attributes};
use crate::services::claims_service::map_claims;
use crate::services::flow_service::Session;

/// A callback failure, carrying whatever flow context was available when it
/// occurred. `flow: None` is the explicit "no flow resolved yet" variant;
/// such failures render flow-agnostically, exactly like a login-flow error.
pub struct CallbackFailure {
    pub flow: Option<Flow>,
    pub provider: String,
    pub staged_traits: Option<serde_json::Value>,
    pub error: SamlSsoError,
}

impl CallbackFailure {
    fn flowless(provider: &str, error: SamlSsoError) -> Self {
        Self {
            flow: None,
            provider: provider.to_string(),
            staged_traits: None,
            error,
        }
    }
}

/// Drive the full callback state machine and produce the final response.
pub async fn handle_callback(
    state: &SamlSsoState,
    headers: &HeaderMap,
    jar: CookieJar,
    query: AcsQuery,
    form: AcsForm,
) -> (CookieJar, Response) {
    let (jar, outcome) = process_callback(state, headers, jar, query, form).await;
    match outcome {
        Ok(response) => (jar, response),
        Err(failure) => {
            let response = render_flow_error(state, failure).await;
            (jar, response)
        }
    }
}

async fn process_callback(
    state: &SamlSsoState,
    headers: &HeaderMap,
    jar: CookieJar,
    query: AcsQuery,
    form: AcsForm,
) -> (CookieJar, Result<Response, CallbackFailure>) {
    // AwaitingCallback: resolve provider configuration and the engine.
    let config = match state.strategy_config().await {
        Ok(config) => config,
        Err(e) => return (jar, Err(CallbackFailure::flowless("", e))),
    };
    let provider = match config.provider(None) {
        Ok(provider) => provider.clone(),
        Err(e) => return (jar, Err(CallbackFailure::flowless("", e))),
    };
    let engine = match state.engines.ensure_initialized(&provider).await {
        Ok(engine) => engine,
        Err(e) => return (jar, Err(CallbackFailure::flowless(&provider.id, e))),
    };

    // AwaitingCallback -> AssertionParsed: only verified assertions pass.
    let accepted =
        accepted_request_ids(engine.as_ref(), headers, provider.allow_idp_initiated).await;
    let assertion = match engine.parse_response(&form, &accepted).await {
        Ok(assertion) => assertion,
        Err(e) => return (jar, Err(CallbackFailure::flowless(&provider.id, e))),
    };

    // AssertionParsed -> ClaimsMapped, still without flow context.
    let attributes = extract_attributes(&assertion);
    let claims = match map_claims(&attributes, &provider.mapper) {
        Ok(claims) => claims,
        Err(e) => return (jar, Err(CallbackFailure::flowless(&provider.id, e))),
    };

    // Consume the continuation; from here on flow context may exist.
    let unsolicited = assertion
        .in_response_to
        .as_deref()
        .unwrap_or_default()
        .is_empty();
    let (jar, flow, staged_traits) = match state.continuity.consume(jar.clone()) {
        Ok((jar, continuation)) => {
            if let Some(in_response_to) = assertion.in_response_to.as_deref() {
                if in_response_to != continuation.request_id {
                    let e = SamlSsoError::Correlation {
                        reason: "assertion does not answer the pending request".to_string(),
                    };
                    return (jar, Err(CallbackFailure::flowless(&provider.id, e)));
                }
            }

            let staged_traits = continuation.traits.clone();
            let flow = match state.flows.resolve(continuation.flow_id).await {
                Ok(flow) => flow,
                Err(e) => {
                    return (
                        jar,
                        Err(CallbackFailure {
                            flow: None,
                            provider: provider.id.clone(),
                            staged_traits,
                            error: e,
                        }),
                    )
                }
            };
            (jar, flow, staged_traits)
        }
        Err(correlation_error) if unsolicited && provider.allow_idp_initiated => {
            // IDP-initiated: no pending flow can exist, so mint a fresh
            // browser registration flow instead of failing the handshake.
            info!(provider = %provider.id, "Unsolicited assertion accepted, creating registration flow");
            match state.flows.registration.create_idp_initiated_flow().await {
                Ok(flow) => (jar, Flow::Registration(flow), None),
                Err(e) => {
                    warn!(error = %correlation_error, "IDP-initiated flow creation failed");
                    return (jar, Err(CallbackFailure::flowless(&provider.id, e)));
                }
            }
        }
        Err(e) => return (jar, Err(CallbackFailure::flowless(&provider.id, e))),
    };

    let session = match state.flows.validate(&flow, headers).await {
        Ok(session) => session,
        Err(e) => {
            return (
                jar,
                Err(CallbackFailure {
                    flow: Some(flow),
                    provider: provider.id.clone(),
                    staged_traits,
                    error: e,
                }),
            )
        }
    };

    // The IDP may report a user-visible denial alongside an otherwise valid
    // correlation; short-circuit to the flow-typed error path.
    if let Some(code) = query.error.as_deref().filter(|c| !c.is_empty()) {
        let e = SamlSsoError::IdpDenied {
            code: code.to_string(),
            description: query.error_description.clone().unwrap_or_default(),
        };
        return (
            jar,
            Err(CallbackFailure {
                flow: Some(flow),
                provider: provider.id.clone(),
                staged_traits,
                error: e,
            }),
        );
    }

    // ClaimsMapped -> {Completed | Errored}: flow-typed completion.
    let completion = complete_flow(state, &flow, session, &provider.id, &claims).await;
    match completion {
        Ok(response) => {
            info!(
                flow_id = %flow.id(),
                provider = %provider.id,
                "SAML callback completed"
            );
            (jar, Ok(response))
        }
        Err(e) => (
            jar,
            Err(CallbackFailure {
                flow: Some(flow),
                provider: provider.id.clone(),
                staged_traits,
                error: e,
            }),
        ),
    }
}

async fn complete_flow(
    state: &SamlSsoState,
    flow: &Flow,
    session: Option<Session>,
    provider: &str,
    claims: &crate::models::IdentityClaims,
) -> SamlSsoResult<Response> {
    match flow {
        Flow::Login(f) => state.identity.complete_login(f, provider, claims).await,
        Flow::Registration(f) => {
            state
                .identity
                .complete_registration(f, provider, claims)
                .await
        }
        Flow::Settings(f) => {
            let session = session.ok_or(SamlSsoError::SessionMismatch)?;
            state
                .identity
                .complete_settings(f, &session, provider, claims)
                .await
        }
    }
}

/// Render a callback failure according to the flow variant that was present.
///
/// Login and settings flows, and failures with no flow context, surface the
/// error unchanged. Registration flows get their UI rebuilt so the user can
/// continue without restarting: nodes are discarded, the CSRF token is
/// reissued, a single "continue with provider" affordance is appended, and any
/// staged traits are re-rendered from the identity schema.
pub async fn render_flow_error(state: &SamlSsoState, failure: CallbackFailure) -> Response {
    match failure.flow {
        Some(Flow::Registration(mut flow)) => {
            let csrf_token = state.csrf.generate_token();
            let trait_nodes = if failure.staged_traits.is_some() {
                match state.schema.trait_nodes().await {
                    Ok(nodes) => nodes,
                    Err(e) => {
                        error!(error = %e, "Trait node generation from identity schema failed");
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            apply_registration_error_ui(
                &mut flow,
                &csrf_token,
                &failure.provider,
                failure.staged_traits.as_ref(),
                trait_nodes,
            );

            if let Err(e) = state
                .flows
                .registration
                .update_registration_flow(flow.clone())
                .await
            {
                error!(error = %e, flow_id = %flow.id, "Failed to persist registration flow after error");
            }

            warn!(flow_id = %flow.id, error = %failure.error, "SAML registration flow errored");
            let status = failure.error.status_code();
            let body = serde_json::json!({
                "error": failure.error.to_body(),
                "flow": flow,
            });
            (status, axum::Json(body)).into_response()
        }
        Some(Flow::Login(flow)) => {
            warn!(flow_id = %flow.id, error = %failure.error, "SAML login flow errored");
            failure.error.into_response()
        }
        Some(Flow::Settings(flow)) => {
            warn!(flow_id = %flow.id, error = %failure.error, "SAML settings flow errored");
            failure.error.into_response()
        }
        None => {
            warn!(error = %failure.error, "SAML callback errored before flow resolution");
            failure.error.into_response()
        }
    }
}

/// Rebuild the registration UI after an error.
pub(crate) fn apply_registration_error_ui(
    flow: &mut RegistrationFlow,
    csrf_token: &str,
    provider: &str,
    staged_traits: Option<&serde_json::Value>,
    trait_nodes: Vec<UiNode>,
) {
    // Existing nodes may reflect another provider's form state; drop them.
    flow.ui.nodes.clear();
    flow.csrf_token = csrf_token.to_string();
    flow.ui.nodes.push(UiNode::csrf(csrf_token));
    flow.ui.nodes.push(UiNode::provider_continue(provider));

    if let Some(staged) = staged_traits {
        flow.ui.nodes.extend(trait_nodes);
        flow.ui.apply_trait_values(staged);
    }
}
