//! Extracted attributes and normalized identity claims.

use std::collections::HashMap;

use serde::Serialize;

/// Claim name to ordered list of string values, as extracted from a verified
/// assertion. Multi-valued claims preserve source order; values are never
/// deduplicated or coerced.
pub type Attributes = HashMap<String, Vec<String>>;

/// A single mapped identity trait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityTrait {
    /// Dotted trait path, e.g. `name.first`.
    pub path: String,
    pub value: serde_json::Value,
}

/// Normalized identity claims derived from attributes and mapping rules.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityClaims {
    /// Provider-scoped subject identifier.
    pub subject: String,
    /// Mapped traits in rule order.
    pub traits: Vec<IdentityTrait>,
}

impl IdentityClaims {
    /// Build the nested traits document expected by the identity subsystem.
    #[must_use]
    pub fn traits_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for t in &self.traits {
            insert_path(&mut root, &t.path, t.value.clone());
        }
        serde_json::Value::Object(root)
    }

    /// Credential identifier used to look up the identity for this provider.
    #[must_use]
    pub fn credential_identifier(&self, provider: &str) -> String {
        format!("{provider}:{}", self.subject)
    }
}

fn insert_path(root: &mut serde_json::Map<String, serde_json::Value>, path: &str, value: serde_json::Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        let serde_json::Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
}
