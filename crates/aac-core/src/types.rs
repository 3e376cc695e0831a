//! Core value objects for OAuth2/OIDC request processing.

use crate::error::OAuthError;
use crate::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// OAuth2 grant types supported by the token endpoint.
///
/// A closed enum replaces string-keyed dispatch: every consumer matches
/// exhaustively, so an unrecognized grant can only be rejected at parse
/// time, never fall through mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Password,
    ClientCredentials,
    RefreshToken,
    Implicit,
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::Implicit => "implicit",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for GrantType {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "password" => Ok(Self::Password),
            "client_credentials" => Ok(Self::ClientCredentials),
            "refresh_token" => Ok(Self::RefreshToken),
            "implicit" => Ok(Self::Implicit),
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }
}

/// OIDC response modes for returning authorization results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Query,
    Fragment,
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

/// Classification of a registered scope.
///
/// Determines which scopes are eligible as defaults for a given flow:
/// client-credential flows keep `Client`/`Generic`, user flows keep
/// `User`/`Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Client,
    User,
    Generic,
}

/// A registered scope with its owning resource and declared audiences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Scope key as it appears on the wire (e.g. `openid`, `profile`).
    pub key: String,
    /// Scope classification.
    pub scope_type: ScopeType,
    /// Identifier of the resource that owns this scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Additional audience identifiers this scope grants access to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
}

impl Scope {
    /// Create a scope with no resource mapping.
    pub fn new(key: impl Into<String>, scope_type: ScopeType) -> Self {
        Self {
            key: key.into(),
            scope_type,
            resource_id: None,
            audience: Vec::new(),
        }
    }

    /// Attach an owning resource id.
    #[must_use]
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Attach audience identifiers.
    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }
}

/// Immutable snapshot of a registered OAuth2 client.
///
/// Loaded per request from the external client store; never mutated by
/// the request pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDetails {
    /// Client identifier.
    pub client_id: String,
    /// Client secret, if the client is confidential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Scopes the client is allowed to request.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Grant types the client may use.
    #[serde(default)]
    pub grant_types: Vec<GrantType>,
    /// Registered redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Preferred JWS algorithm for ID tokens (e.g. `RS256`, `HS256`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_alg: Option<String>,
    /// Requested JWE content encryption for ID tokens (e.g. `A256GCM`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_method: Option<String>,
    /// Client key material supplied by value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,
    /// Client key material supplied by reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    /// Per-client override of the ID token validity window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_validity_secs: Option<i64>,
    /// Whether access-token claims are mirrored into the ID token.
    #[serde(default)]
    pub mirror_access_token_claims: bool,
}

impl ClientDetails {
    /// Minimal client for a given id; everything else defaulted.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            scopes: Vec::new(),
            grant_types: Vec::new(),
            redirect_uris: Vec::new(),
            signing_alg: None,
            encryption_method: None,
            jwks: None,
            jwks_uri: None,
            id_token_validity_secs: None,
            mirror_access_token_claims: false,
        }
    }
}

/// Authenticated end-user context handed to the ID-token pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAuthentication {
    /// Stable account identifier (becomes the `sub` claim).
    pub subject: String,
    /// Unix timestamp of the authentication event, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Flat user attributes available to claim extractors.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl UserAuthentication {
    /// Create an authentication for a subject with no attributes.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            auth_time: None,
            attributes: HashMap::new(),
        }
    }

    /// Set the recorded authentication time.
    #[must_use]
    pub fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_type_round_trip() {
        for (s, g) in [
            ("authorization_code", GrantType::AuthorizationCode),
            ("password", GrantType::Password),
            ("client_credentials", GrantType::ClientCredentials),
            ("refresh_token", GrantType::RefreshToken),
            ("implicit", GrantType::Implicit),
        ] {
            assert_eq!(s.parse::<GrantType>().unwrap(), g);
            assert_eq!(g.to_string(), s);
        }
    }

    #[test]
    fn test_unknown_grant_type_is_unsupported() {
        let err = "device_code".parse::<GrantType>().unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedGrantType(ref g) if g == "device_code"));
    }

    #[test]
    fn test_scope_builder() {
        let scope = Scope::new("storage.read", ScopeType::User)
            .with_resource("storage")
            .with_audience(vec!["storage-api".to_string()]);

        assert_eq!(scope.key, "storage.read");
        assert_eq!(scope.resource_id.as_deref(), Some("storage"));
        assert_eq!(scope.audience, ["storage-api"]);
    }

    #[test]
    fn test_client_details_defaults() {
        let client = ClientDetails::new("client-1");
        assert_eq!(client.client_id, "client-1");
        assert!(client.scopes.is_empty());
        assert!(!client.mirror_access_token_claims);
        assert!(client.id_token_validity_secs.is_none());
    }
}
