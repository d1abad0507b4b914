//! Attribute extraction from verified assertions.

use axum::http::HeaderMap;

use crate::models::{Attributes, ParsedAssertion};
use crate::services::engine_service::SamlEngine;

/// Flatten a verified assertion into a claim-name to values mapping.
///
/// The claim key is the attribute's friendly name when non-empty, otherwise
/// the raw attribute name. Values are appended in encounter order across all
/// attribute statements; nothing is deduplicated or type-coerced. An assertion
/// with zero statements yields an empty mapping.
#[must_use]
pub fn extract_attributes(assertion: &ParsedAssertion) -> Attributes {
    let mut attributes = Attributes::new();

    for statement in &assertion.attribute_statements {
        for attr in &statement.attributes {
            let claim_name = match attr.friendly_name.as_deref() {
                Some(friendly) if !friendly.is_empty() => friendly,
                _ => attr.name.as_str(),
            };
            attributes
                .entry(claim_name.to_string())
                .or_default()
                .extend(attr.values.iter().cloned());
        }
    }

    attributes
}

/// Correlation request IDs the engine should accept for this callback.
///
/// The engine tracks outstanding SP-initiated request IDs itself; when the
/// provider permits IDP-initiated SSO the empty string is additionally
/// accepted, standing for "no prior request".
pub async fn accepted_request_ids(
    engine: &dyn SamlEngine,
    headers: &HeaderMap,
    allow_idp_initiated: bool,
) -> Vec<String> {
    let mut ids = Vec::new();
    if allow_idp_initiated {
        ids.push(String::new());
    }
    ids.extend(engine.tracked_request_ids(headers).await);
    ids
}
