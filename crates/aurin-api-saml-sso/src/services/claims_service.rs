//! Mapping extracted attributes to normalized identity claims.

use tracing::warn;

use crate::error::{SamlSsoError, SamlSsoResult};
use crate::models::{Attributes, ClaimsMapperRules, IdentityClaims, IdentityTrait};

/// Apply the provider's mapping rules to extracted attributes.
///
/// The mapping is deterministic: the subject is the first value of the
/// configured subject claim, traits are produced in rule order. A missing
/// subject or missing required claim is an operator-actionable
/// misconfiguration, not a user mistake.
pub fn map_claims(
    attributes: &Attributes,
    rules: &ClaimsMapperRules,
) -> SamlSsoResult<IdentityClaims> {
    let subject = attributes
        .get(&rules.subject_source)
        .and_then(|values| values.first())
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| {
            warn!(claim = %rules.subject_source, "Subject claim missing from assertion");
            SamlSsoError::ClaimsMapping {
                claim: rules.subject_source.clone(),
            }
        })?;

    let mut traits = Vec::with_capacity(rules.traits.len());
    for rule in &rules.traits {
        let values = attributes.get(&rule.claim).filter(|v| !v.is_empty());
        match values {
            Some(values) => {
                let value = if rule.multi_value {
                    serde_json::Value::Array(
                        values
                            .iter()
                            .map(|v| serde_json::Value::String(v.clone()))
                            .collect(),
                    )
                } else {
                    serde_json::Value::String(values[0].clone())
                };
                traits.push(IdentityTrait {
                    path: rule.trait_path.clone(),
                    value,
                });
            }
            None if rule.required => {
                warn!(claim = %rule.claim, "Required claim missing from assertion");
                return Err(SamlSsoError::ClaimsMapping {
                    claim: rule.claim.clone(),
                });
            }
            None => {}
        }
    }

    Ok(IdentityClaims { subject, traits })
}
