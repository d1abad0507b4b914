//! Browser initiation handler for SP-initiated auth flows.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::SamlSsoError;
use crate::router::SamlSsoState;

/// Query parameters for the browser initiation endpoint.
#[derive(Debug, Deserialize)]
pub struct InitiateQuery {
    /// Pending self-service flow to continue after the IDP round trip.
    pub flow: Option<Uuid>,
    /// Provider to authenticate against; defaults to the first configured one.
    pub provider: Option<String>,
    /// User input captured before the redirect, as a JSON object. Carried
    /// opaquely through the handshake and re-rendered should the flow error.
    pub traits: Option<String>,
    /// Where the identity subsystem should send the browser afterwards.
    pub return_to: Option<String>,
}

/// Redirect the browser to the IDP, binding a continuation to it first.
///
/// A browser that already holds an active session is sent to the default
/// return URL instead of the IDP.
#[utoipa::path(
    get,
    path = "/self-service/methods/saml/browser",
    params(
        ("flow" = Uuid, Query, description = "Pending self-service flow ID"),
        ("provider" = Option<String>, Query, description = "Provider ID, defaults to the first configured provider"),
        ("traits" = Option<String>, Query, description = "Staged registration traits as a JSON object"),
        ("return_to" = Option<String>, Query, description = "Post-completion return URL"),
    ),
    responses(
        (status = 307, description = "Redirect to the IDP SSO endpoint, or to the default return URL when a session exists"),
        (status = 400, description = "Missing flow parameter or malformed traits"),
        (status = 500, description = "Provider misconfigured or engine construction failed"),
    ),
    tag = "SAML"
)]
pub async fn initiate(
    State(state): State<SamlSsoState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<InitiateQuery>,
) -> Result<(CookieJar, Response), SamlSsoError> {
    if let Some(session) = state.flows.sessions.session_from_request(&headers).await? {
        info!(session_id = %session.id, "Session already active, skipping IDP redirect");
        return Ok((
            jar,
            Redirect::temporary(&state.default_return_to).into_response(),
        ));
    }

    let flow_id = query.flow.ok_or_else(|| SamlSsoError::Correlation {
        reason: "missing flow query parameter".to_string(),
    })?;

    let staged_traits = match query.traits.as_deref() {
        Some(raw) => Some(serde_json::from_str::<serde_json::Value>(raw)?),
        None => None,
    };

    let config = state.strategy_config().await?;
    let provider = config.provider(query.provider.as_deref())?;
    let engine = state.engines.ensure_initialized(provider).await?;

    let sso = engine.initiate(query.return_to.as_deref()).await?;
    let jar = state
        .continuity
        .issue(jar, flow_id, &sso.request_id, staged_traits)?;

    info!(
        flow_id = %flow_id,
        provider = %provider.id,
        "Redirecting browser to IDP"
    );

    Ok((jar, Redirect::temporary(&sso.redirect_url).into_response()))
}
