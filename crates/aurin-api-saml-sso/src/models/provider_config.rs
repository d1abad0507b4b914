//! Per-tenant SAML provider configuration.
//!
//! The strategy configuration is stored as an opaque JSON blob by the tenant
//! configuration subsystem. Decoding is strict: unknown fields are rejected so
//! that operator typos surface as configuration errors instead of silently
//! disabling features.

use serde::{Deserialize, Serialize};

use crate::error::{SamlSsoError, SamlSsoResult};

/// Source of the raw strategy configuration blob.
///
/// Implemented by the tenant configuration subsystem; this crate only decodes
/// the payload and never caches it across requests.
#[async_trait::async_trait]
pub trait StrategyConfigSource: Send + Sync {
    /// Fetch the raw SAML strategy configuration for the current tenant.
    async fn strategy_config(&self) -> SamlSsoResult<serde_json::Value>;
}

/// Decoded SAML strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlStrategyConfig {
    pub providers: Vec<ProviderConfiguration>,
}

/// A single identity-provider configuration.
///
/// Either `idp_metadata_url` or `idp_information` must be present: the first
/// lets the engine fetch the IDP metadata document, the second describes the
/// IDP explicitly so the engine can synthesize metadata from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfiguration {
    /// Stable provider identifier, referenced by UI nodes.
    pub id: String,
    /// Human-readable label for login buttons.
    #[serde(default)]
    pub label: Option<String>,
    /// URL of the IDP metadata document.
    #[serde(default)]
    pub idp_metadata_url: Option<String>,
    /// Explicit IDP description when no metadata document is published.
    #[serde(default)]
    pub idp_information: Option<IdpInformation>,
    /// Path to the SP signing certificate (PEM).
    pub public_cert_path: String,
    /// Path to the SP signing key (PEM).
    pub private_key_path: String,
    /// Accept unsolicited (IDP-initiated) assertions for this provider.
    #[serde(default)]
    pub allow_idp_initiated: bool,
    /// Attribute-to-trait mapping rules.
    pub mapper: ClaimsMapperRules,
}

/// Explicit IDP endpoints used when no metadata URL is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdpInformation {
    pub entity_id: String,
    pub sso_url: String,
    #[serde(default)]
    pub logout_url: Option<String>,
    pub certificate_path: String,
}

/// Rules turning extracted assertion attributes into identity claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimsMapperRules {
    /// Claim whose first value becomes the subject identifier.
    pub subject_source: String,
    /// Trait mapping rules, applied in order.
    #[serde(default)]
    pub traits: Vec<TraitRule>,
}

/// A single attribute-to-trait mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraitRule {
    /// Claim name as produced by the attribute extractor.
    pub claim: String,
    /// Dotted trait path, e.g. `name.first`.
    pub trait_path: String,
    /// Fail the mapping when the claim is absent.
    #[serde(default)]
    pub required: bool,
    /// Map all values as a JSON array instead of the first value only.
    #[serde(default)]
    pub multi_value: bool,
}

impl SamlStrategyConfig {
    /// Strictly decode a strategy configuration blob.
    ///
    /// The raw payload is never logged; only the decode error is.
    pub fn decode(raw: serde_json::Value) -> SamlSsoResult<Self> {
        let config: SamlStrategyConfig =
            serde_json::from_value(raw).map_err(|e| {
                tracing::error!(error = %e, "Unable to decode SAML provider configuration (payload redacted)");
                SamlSsoError::Configuration {
                    message: format!("unable to decode SAML provider configuration: {e}"),
                }
            })?;

        if config.providers.is_empty() {
            return Err(SamlSsoError::Configuration {
                message: "no SAML providers configured".to_string(),
            });
        }

        for provider in &config.providers {
            match &provider.idp_metadata_url {
                Some(metadata_url) => {
                    url::Url::parse(metadata_url).map_err(|e| SamlSsoError::Configuration {
                        message: format!(
                            "provider \"{}\" has an invalid idp_metadata_url: {e}",
                            provider.id
                        ),
                    })?;
                }
                None if provider.idp_information.is_none() => {
                    return Err(SamlSsoError::Configuration {
                        message: format!(
                            "provider \"{}\" has neither idp_metadata_url nor idp_information",
                            provider.id
                        ),
                    });
                }
                None => {}
            }
        }

        Ok(config)
    }

    /// Select a provider by id, defaulting to the first configured provider.
    pub fn provider(&self, id: Option<&str>) -> SamlSsoResult<&ProviderConfiguration> {
        match id {
            Some(id) => self
                .providers
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| SamlSsoError::Configuration {
                    message: format!("unknown SAML provider \"{id}\""),
                }),
            None => self
                .providers
                .first()
                .ok_or_else(|| SamlSsoError::Configuration {
                    message: "no SAML providers configured".to_string(),
                }),
        }
    }
}
