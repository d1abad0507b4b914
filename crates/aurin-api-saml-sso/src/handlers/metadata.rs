//! SP metadata handler.

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;

use crate::error::SamlSsoError;
use crate::router::SamlSsoState;

/// Query parameters for the metadata endpoint.
#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    /// Provider to serve metadata for; defaults to the first configured one.
    pub provider: Option<String>,
}

/// Serve the service-provider metadata document.
#[utoipa::path(
    get,
    path = "/self-service/methods/saml/metadata",
    params(
        ("provider" = Option<String>, Query, description = "Provider ID, defaults to the first configured provider"),
    ),
    responses(
        (status = 200, description = "SP metadata XML document"),
        (status = 500, description = "Provider misconfigured or engine construction failed"),
    ),
    tag = "SAML"
)]
pub async fn metadata(
    State(state): State<SamlSsoState>,
    Query(query): Query<MetadataQuery>,
) -> Result<Response, SamlSsoError> {
    let config = state.strategy_config().await?;
    let provider = config.provider(query.provider.as_deref())?;
    let engine = state.engines.ensure_initialized(provider).await?;
    engine.serve_metadata().await
}
