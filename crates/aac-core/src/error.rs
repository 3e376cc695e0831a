//! OAuth2/OIDC error types.
//!
//! Provides error types for OAuth2/OIDC request processing following
//! RFC 6749 and OpenID Connect Core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for AAC core operations.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// OAuth2 error codes as defined in RFC 6749 and OpenID Connect Core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// The request is missing a required parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed or the client is unknown.
    InvalidClient,
    /// The requested scope is invalid, unknown, or malformed.
    InvalidScope,
    /// The authorization server does not support the grant type.
    UnsupportedGrantType,
    /// OIDC: the `request_uri` parameter is not supported.
    RequestUriNotSupported,
    /// OIDC: the `request` parameter contains an invalid request object.
    InvalidRequestObject,
    /// The resource owner authentication is missing or no longer valid.
    InsufficientAuthentication,
    /// The authorization server encountered an unexpected condition.
    ServerError,
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidScope => "invalid_scope",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::InvalidRequestObject => "invalid_request_object",
            Self::InsufficientAuthentication => "insufficient_authentication",
            Self::ServerError => "server_error",
        };
        write!(f, "{}", s)
    }
}

/// OAuth2 error response following RFC 6749 Section 5.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code.
    pub error: OAuthErrorCode,
    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI with more information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthErrorResponse {
    /// Create a new error response.
    pub fn new(error: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            error_uri: None,
        }
    }
}

/// OAuth2/OIDC request processing errors.
///
/// Validation failures are detected at the boundary and carry the
/// original diagnostic message. Internal cache/lookup failures degrade
/// to `None` at the call site and never surface through this type.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Malformed parameter, client_id mismatch, or missing required field.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested scope is not permitted for this grant.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Grant type not recognized, or not constructible from raw parameters.
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Client lookup failed.
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Missing user authentication, or `max_age` exceeded.
    #[error("Insufficient authentication: {0}")]
    InsufficientAuthentication(String),

    /// The `request_uri` parameter is not implemented.
    #[error("The request_uri parameter is not supported")]
    UnsupportedRequestUri,

    /// The JWT `request` object is malformed or not a plain JOSE object.
    #[error("Invalid request object: {0}")]
    InvalidRequestObject(String),

    /// Claim extraction, signing or serialization failure.
    #[error("Server error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// Get the OAuth2 wire error code for this error.
    pub fn error_code(&self) -> OAuthErrorCode {
        match self {
            Self::InvalidRequest(_) => OAuthErrorCode::InvalidRequest,
            Self::InvalidScope(_) => OAuthErrorCode::InvalidScope,
            Self::UnsupportedGrantType(_) => OAuthErrorCode::UnsupportedGrantType,
            Self::InvalidClient(_) => OAuthErrorCode::InvalidClient,
            Self::InsufficientAuthentication(_) => OAuthErrorCode::InsufficientAuthentication,
            Self::UnsupportedRequestUri => OAuthErrorCode::RequestUriNotSupported,
            Self::InvalidRequestObject(_) => OAuthErrorCode::InvalidRequestObject,
            Self::ServerError(_) => OAuthErrorCode::ServerError,
        }
    }

    /// Convert to an OAuth2 error response body.
    pub fn to_response(&self) -> OAuthErrorResponse {
        OAuthErrorResponse::new(self.error_code(), self.to_string())
    }
}
