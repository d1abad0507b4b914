//! Verified-assertion and ACS request models.
//!
//! A [`ParsedAssertion`] is only ever produced by the service-provider engine
//! after signature verification; nothing in this crate inspects raw SAML XML.

use serde::{Deserialize, Serialize};

/// Attribute carried by an attribute statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionAttribute {
    /// Raw attribute name (often a URN).
    pub name: String,
    /// Optional human-friendly name, preferred as claim key when non-empty.
    pub friendly_name: Option<String>,
    /// Attribute values in document order.
    pub values: Vec<String>,
}

/// One attribute statement of a verified assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeStatement {
    pub attributes: Vec<AssertionAttribute>,
}

/// A cryptographically verified assertion, as surfaced by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedAssertion {
    /// The `InResponseTo` correlation value; `None` for unsolicited
    /// (IDP-initiated) assertions.
    pub in_response_to: Option<String>,
    pub attribute_statements: Vec<AttributeStatement>,
}

/// Form body POSTed by the IDP to the ACS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState", default)]
    pub relay_state: Option<String>,
}

/// Query parameters the IDP may attach to the ACS callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcsQuery {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}
