//! SAML self-service error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// SAML self-service errors.
#[derive(Debug, Error)]
pub enum SamlSsoError {
    #[error("Provider configuration error: {message}")]
    Configuration { message: String },

    #[error("SAML protocol error: {reason}")]
    Protocol { reason: String },

    #[error("Unable to complete the SAML login because the identity provider returned error \"{code}\": {description}")]
    IdpDenied { code: String, description: String },

    #[error("Invalid continuation: {reason}")]
    Correlation { reason: String },

    #[error("Self-service flow not found")]
    FlowNotFound,

    #[error("API flows are not supported by the SAML method")]
    ApiFlowNotSupported,

    #[error("The self-service flow expired or is no longer valid: {reason}")]
    FlowExpiredOrInvalid { reason: String },

    #[error("No active session matches the settings flow owner")]
    SessionMismatch,

    #[error("Claim \"{claim}\" is missing or could not be mapped to an identity trait")]
    ClaimsMapping { claim: String },

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Error response structure for API responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SamlSsoError {
    /// Get the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SamlSsoError::Configuration { .. } => "configuration_error",
            SamlSsoError::Protocol { .. } => "protocol_error",
            SamlSsoError::IdpDenied { .. } => "protocol_error",
            SamlSsoError::Correlation { .. } => "correlation_error",
            SamlSsoError::FlowNotFound => "flow_not_found",
            SamlSsoError::ApiFlowNotSupported => "api_flow_not_supported",
            SamlSsoError::FlowExpiredOrInvalid { .. } => "flow_expired_or_invalid",
            SamlSsoError::SessionMismatch => "session_mismatch",
            SamlSsoError::ClaimsMapping { .. } => "claims_mapping_error",
            SamlSsoError::Jwt(_) => "jwt_error",
            SamlSsoError::Json(_) => "json_error",
            SamlSsoError::Http(_) => "http_error",
            SamlSsoError::Internal { .. } => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            SamlSsoError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SamlSsoError::Protocol { .. } => StatusCode::BAD_REQUEST,
            SamlSsoError::IdpDenied { .. } => StatusCode::BAD_REQUEST,
            SamlSsoError::Correlation { .. } => StatusCode::BAD_REQUEST,
            SamlSsoError::FlowNotFound => StatusCode::NOT_FOUND,
            SamlSsoError::ApiFlowNotSupported => StatusCode::BAD_REQUEST,
            SamlSsoError::FlowExpiredOrInvalid { .. } => StatusCode::GONE,
            SamlSsoError::SessionMismatch => StatusCode::FORBIDDEN,
            SamlSsoError::ClaimsMapping { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SamlSsoError::Jwt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SamlSsoError::Json(_) => StatusCode::BAD_REQUEST,
            SamlSsoError::Http(_) => StatusCode::BAD_GATEWAY,
            SamlSsoError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the sanitized response body for this error.
    ///
    /// Assertion internals, raw configuration payloads and library errors are
    /// logged here and replaced with generic messages. Errors the end user can
    /// act on (provider denial, stale flows) keep their message.
    #[must_use]
    pub fn to_body(&self) -> ErrorResponse {
        let message = match self {
            SamlSsoError::Configuration { message } => {
                tracing::error!(message = %message, "SAML provider configuration error");
                "A provider configuration error occurred".to_string()
            }
            SamlSsoError::Protocol { reason } => {
                tracing::warn!(reason = %reason, "SAML assertion rejected");
                "Authentication with the identity provider failed".to_string()
            }
            SamlSsoError::Correlation { reason } => {
                tracing::warn!(reason = %reason, "SAML continuation rejected");
                "The login flow could not be executed. Please retry the flow.".to_string()
            }
            SamlSsoError::ClaimsMapping { claim } => {
                tracing::error!(claim = %claim, "SAML claims mapping misconfiguration");
                "The identity provider response could not be mapped to an identity".to_string()
            }
            SamlSsoError::Jwt(e) => {
                tracing::error!(error = %e, "SAML continuation JWT error");
                "A token processing error occurred".to_string()
            }
            SamlSsoError::Json(e) => {
                tracing::error!(error = %e, "SAML JSON error");
                "A data processing error occurred".to_string()
            }
            SamlSsoError::Http(e) => {
                tracing::error!(error = %e, "SAML HTTP client error");
                "An HTTP client error occurred".to_string()
            }
            SamlSsoError::Internal { message } => {
                tracing::error!(message = %message, "SAML internal error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        ErrorResponse {
            error: self.error_code().to_string(),
            message,
            details: None,
        }
    }
}

impl IntoResponse for SamlSsoError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_body();
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for SAML self-service operations.
pub type SamlSsoResult<T> = Result<T, SamlSsoError>;
