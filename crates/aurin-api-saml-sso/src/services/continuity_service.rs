//! Flow correlation via a signed, single-use continuation cookie.
//!
//! Initiating an SP-initiated auth flow binds `{flow id, correlation request
//! id, staged traits}` to the browser as an HS256-signed cookie. The ACS
//! callback consumes it exactly once: a missing, tampered, expired or replayed
//! token fails closed with a correlation error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SamlSsoError, SamlSsoResult};

/// Cookie carrying the signed continuation token.
pub const CONTINUATION_COOKIE: &str = "aurin_saml_continuation";

/// Continuation lifetime in minutes.
const CONTINUATION_LIFETIME_MINUTES: i64 = 10;

/// Claims stored in the signed continuation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContinuationClaims {
    /// Pending self-service flow.
    flow_id: Uuid,
    /// Correlation value the IDP will echo back.
    request_id: String,
    /// Staged user input captured before the redirect, opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    traits: Option<serde_json::Value>,
    /// Single-use token identifier.
    jti: Uuid,
    exp: i64,
    iat: i64,
}

/// The recovered continuation, after signature and replay checks.
#[derive(Debug, Clone)]
pub struct Continuation {
    pub flow_id: Uuid,
    pub request_id: String,
    pub traits: Option<serde_json::Value>,
}

/// Issues and consumes continuation tokens.
#[derive(Clone)]
pub struct ContinuityService {
    secret: Vec<u8>,
    /// Consumed token IDs with their expiry, pruned as tokens age out.
    consumed: Arc<Mutex<HashMap<Uuid, i64>>>,
}

impl ContinuityService {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            consumed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind a continuation to the browser context.
    pub fn issue(
        &self,
        jar: CookieJar,
        flow_id: Uuid,
        request_id: &str,
        traits: Option<serde_json::Value>,
    ) -> SamlSsoResult<CookieJar> {
        let now = Utc::now();
        let claims = ContinuationClaims {
            flow_id,
            request_id: request_id.to_string(),
            traits,
            jti: Uuid::new_v4(),
            exp: (now + Duration::minutes(CONTINUATION_LIFETIME_MINUTES)).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;

        let cookie = Cookie::build((CONTINUATION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        Ok(jar.add(cookie))
    }

    /// Retrieve and invalidate the continuation bound to this browser.
    ///
    /// Fails with a correlation error when the cookie is absent, malformed,
    /// signature-invalid, expired, or was already consumed. On success the
    /// cookie is removed from the returned jar.
    pub fn consume(&self, jar: CookieJar) -> SamlSsoResult<(CookieJar, Continuation)> {
        let Some(cookie) = jar.get(CONTINUATION_COOKIE) else {
            return Err(SamlSsoError::Correlation {
                reason: "continuation cookie is missing".to_string(),
            });
        };

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.required_spec_claims.clear();

        let token_data = decode::<ContinuationClaims>(
            cookie.value(),
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| SamlSsoError::Correlation {
            reason: format!("continuation token rejected: {e}"),
        })?;

        let claims = token_data.claims;
        {
            let now = Utc::now().timestamp();
            let mut consumed = self
                .consumed
                .lock()
                .map_err(|_| SamlSsoError::Internal {
                    message: "continuation replay registry poisoned".to_string(),
                })?;
            consumed.retain(|_, exp| *exp > now);
            if consumed.insert(claims.jti, claims.exp).is_some() {
                return Err(SamlSsoError::Correlation {
                    reason: "continuation token already consumed".to_string(),
                });
            }
        }

        let removal = Cookie::build((CONTINUATION_COOKIE, "")).path("/").build();
        let jar = jar.remove(removal);
        Ok((
            jar,
            Continuation {
                flow_id: claims.flow_id,
                request_id: claims.request_id,
                traits: claims.traits,
            },
        ))
    }
}
