//! Assertion consumer service handler.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Form,
};
use axum_extra::extract::cookie::CookieJar;

use crate::models::{AcsForm, AcsQuery};
use crate::router::SamlSsoState;
use crate::services::dispatch_service;

/// Consume the IDP's assertion POST and complete the pending flow.
///
/// All outcomes, success and failure alike, are produced by the dispatch
/// service; this handler only adapts the HTTP surface.
#[utoipa::path(
    post,
    path = "/self-service/methods/saml/acs",
    responses(
        (status = 200, description = "Flow completed, response produced by the identity subsystem"),
        (status = 400, description = "Assertion rejected, correlation failed, or the IDP reported an error"),
        (status = 403, description = "Settings flow without a matching session"),
        (status = 410, description = "Flow expired"),
    ),
    tag = "SAML"
)]
pub async fn acs(
    State(state): State<SamlSsoState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<AcsQuery>,
    Form(form): Form<AcsForm>,
) -> (CookieJar, Response) {
    dispatch_service::handle_callback(&state, &headers, jar, query, form).await
}
