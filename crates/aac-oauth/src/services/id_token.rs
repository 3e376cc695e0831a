//! ID token assembly, signing and optional encryption.

use crate::services::key_service::KeySigningService;
use crate::services::token_hash;
use aac_core::{ClaimsExtractor, ClientStore, OAuthError, UserAuthentication};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Default ID token validity when the client has no override.
const DEFAULT_VALIDITY_SECS: i64 = 3600;

/// Registered JWT claims that are never mirrored from an access token.
const REGISTERED_CLAIMS: &[&str] = &["iss", "sub", "aud", "exp", "nbf", "iat", "jti"];

/// OIDC standard claims that the per-scope extractors own; mirrored
/// access-token claims must not shadow them.
const STANDARD_CLAIMS: &[&str] = &[
    "name",
    "given_name",
    "family_name",
    "middle_name",
    "nickname",
    "preferred_username",
    "profile",
    "picture",
    "website",
    "email",
    "email_verified",
    "gender",
    "birthdate",
    "zoneinfo",
    "locale",
    "phone_number",
    "phone_number_verified",
    "address",
    "updated_at",
    "auth_time",
    "nonce",
    "azp",
    "at_hash",
    "c_hash",
];

/// Scopes whose claims are served by the UserInfo endpoint when an
/// access token accompanies the ID token (OIDC Core 5.4).
const USERINFO_SCOPES: &[&str] = &["profile", "email", "phone", "address"];

/// The claim set carried by an issued ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    /// Single-valued audience, always the client id.
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub azp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    /// Extracted and mirrored claims.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Everything the builder needs about one token issuance.
#[derive(Debug, Clone, Default)]
pub struct IdTokenRequest {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub user: Option<UserAuthentication>,
    pub nonce: Option<String>,
    /// Access token issued alongside, if any. Drives `at_hash` and the
    /// UserInfo claim split.
    pub access_token: Option<String>,
    /// Claims carried by that access token, for mirroring.
    pub access_token_claims: HashMap<String, Value>,
    /// Authorization code issued alongside, if any. Drives `c_hash`.
    pub code: Option<String>,
    /// `max_age` the client requested at the authorization endpoint.
    pub max_age: Option<i64>,
    /// Whether the authorization request explicitly flagged an ID token
    /// response. A missing `auth_time` is then a configuration problem
    /// worth logging even without `max_age`.
    pub id_token_requested: bool,
}

/// Builds, signs and optionally encrypts ID tokens.
pub struct IdTokenBuilder {
    issuer: String,
    client_store: Arc<dyn ClientStore>,
    key_service: Arc<KeySigningService>,
    extractors: HashMap<String, Arc<dyn ClaimsExtractor>>,
}

impl IdTokenBuilder {
    pub fn new(
        issuer: impl Into<String>,
        client_store: Arc<dyn ClientStore>,
        key_service: Arc<KeySigningService>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_store,
            key_service,
            extractors: HashMap::new(),
        }
    }

    /// Register a claims extractor for a scope.
    #[must_use]
    pub fn with_extractor(
        mut self,
        scope: impl Into<String>,
        extractor: Arc<dyn ClaimsExtractor>,
    ) -> Self {
        self.extractors.insert(scope.into(), extractor);
        self
    }

    /// Build an ID token for one issuance.
    ///
    /// Returns `Ok(None)` when the request carries no `openid` scope,
    /// since only OIDC requests receive an ID token.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn build(&self, request: &IdTokenRequest) -> Result<Option<String>, OAuthError> {
        if !request.scopes.iter().any(|s| s == "openid") {
            return Ok(None);
        }

        let client = self.client_store.lookup(&request.client_id)?;
        let user = request.user.as_ref().ok_or_else(|| {
            OAuthError::InvalidRequest("ID token issuance requires user authentication".to_string())
        })?;

        self.enforce_max_age(request, user)?;

        let now = Utc::now().timestamp();
        let validity = client
            .id_token_validity_secs
            .unwrap_or(DEFAULT_VALIDITY_SECS);
        let alg = client.signing_alg.as_deref().unwrap_or("RS256");

        let mut extra = HashMap::new();
        if client.mirror_access_token_claims {
            self.mirror_claims(&request.access_token_claims, &mut extra);
        }
        self.apply_extractors(request, user, &mut extra)?;

        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: user.subject.clone(),
            aud: client.client_id.clone(),
            exp: now + validity,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            azp: client.client_id.clone(),
            auth_time: user.auth_time,
            nonce: request.nonce.clone(),
            at_hash: request
                .access_token
                .as_deref()
                .and_then(|at| token_hash::half_hash(alg, at)),
            c_hash: request
                .code
                .as_deref()
                .and_then(|code| token_hash::half_hash(alg, code)),
            extra,
        };

        let signer = self
            .key_service
            .get_signer(&client)
            .await
            .ok_or_else(|| {
                OAuthError::ServerError(format!(
                    "no signing key available for client {}",
                    client.client_id
                ))
            })?;
        let mut token = signer.sign(&claims)?;

        if let Some(encrypter) = self.key_service.get_encrypter(&client).await {
            token = encrypter.encrypt(&token)?;
        }

        Ok(Some(token))
    }

    /// Re-authentication freshness per OIDC Core 3.1.2.1.
    fn enforce_max_age(
        &self,
        request: &IdTokenRequest,
        user: &UserAuthentication,
    ) -> Result<(), OAuthError> {
        match user.auth_time {
            Some(auth_time) => {
                if let Some(max_age) = request.max_age {
                    if auth_time + max_age < Utc::now().timestamp() {
                        return Err(OAuthError::InsufficientAuthentication(format!(
                            "authentication is older than the requested max_age of {max_age}s"
                        )));
                    }
                }
            }
            None if request.max_age.is_some() || request.id_token_requested => {
                // Without a recorded timestamp the check cannot be
                // enforced; issue anyway but leave a trace.
                warn!(
                    max_age = request.max_age,
                    "No auth_time recorded for an authentication-sensitive request"
                );
            }
            None => {}
        }
        Ok(())
    }

    fn mirror_claims(
        &self,
        source: &HashMap<String, Value>,
        target: &mut HashMap<String, Value>,
    ) {
        for (name, value) in source {
            if REGISTERED_CLAIMS.contains(&name.as_str())
                || STANDARD_CLAIMS.contains(&name.as_str())
            {
                continue;
            }
            target.insert(name.clone(), value.clone());
        }
    }

    /// Run the registered per-scope extractors and merge their flat
    /// output. Nested values are dropped since ID token claims stay one
    /// level deep, and an earlier scope's claim is never overwritten by
    /// a later one.
    fn apply_extractors(
        &self,
        request: &IdTokenRequest,
        user: &UserAuthentication,
        target: &mut HashMap<String, Value>,
    ) -> Result<(), OAuthError> {
        let has_access_token = request.access_token.is_some();
        for scope in &request.scopes {
            // With an access token present these claims come from the
            // UserInfo endpoint instead.
            if has_access_token && USERINFO_SCOPES.contains(&scope.as_str()) {
                debug!(scope, "Deferring scope claims to UserInfo");
                continue;
            }
            let Some(extractor) = self.extractors.get(scope) else {
                continue;
            };
            for (name, value) in extractor.extract(user)? {
                if REGISTERED_CLAIMS.contains(&name.as_str()) {
                    continue;
                }
                if matches!(value, Value::Object(_) | Value::Array(_)) {
                    debug!(scope, claim = %name, "Dropping non-flat extracted claim");
                    continue;
                }
                target.entry(name).or_insert(value);
            }
        }
        Ok(())
    }
}
