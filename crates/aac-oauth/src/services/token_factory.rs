//! Token request construction and grant-type dispatch.

use crate::models::token_request::{TokenRequest, TokenRequestCore};
use crate::models::AuthorizationRequest;
use crate::params;
use crate::scope_resolver::ScopeResolver;
use aac_core::{ClientDetails, FlowExtensions, GrantType, OAuthError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The `offline_access` scope, which gates refresh token issuance.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// Builds typed token requests from raw token endpoint parameters.
///
/// Dispatch is a one-shot transition on the grant type: raw parameters
/// go in, exactly one [`TokenRequest`] variant (or a protocol error)
/// comes out.
#[derive(Clone)]
pub struct TokenRequestFactory {
    scope_resolver: ScopeResolver,
    flow_extensions: Option<Arc<dyn FlowExtensions>>,
}

impl TokenRequestFactory {
    /// Create a factory with the given scope resolver.
    pub fn new(scope_resolver: ScopeResolver) -> Self {
        Self {
            scope_resolver,
            flow_extensions: None,
        }
    }

    /// Attach a pre-grant flow extension hook.
    #[must_use]
    pub fn with_flow_extensions(mut self, extensions: Arc<dyn FlowExtensions>) -> Self {
        self.flow_extensions = Some(extensions);
        self
    }

    /// Build a typed token request from raw parameters for an
    /// authenticated client.
    ///
    /// A `client_id` parameter, when present, must equal the
    /// authenticated client's id; when absent it defaults to it. An
    /// optional pre-grant hook may rewrite parameters, after which
    /// `client_id` and `grant_type` are force-reset to their resolved
    /// values so the hook cannot smuggle a different client or grant.
    #[instrument(skip(self, raw_params, client), fields(client_id = %client.client_id))]
    pub fn build(
        &self,
        raw_params: &HashMap<String, String>,
        client: &ClientDetails,
    ) -> Result<TokenRequest, OAuthError> {
        let client_id = self.resolve_client_id(raw_params, client)?;

        let grant_param = raw_params
            .get("grant_type")
            .ok_or_else(|| OAuthError::InvalidRequest("grant_type is required".to_string()))?;
        let grant_type: GrantType = params::validate_slug("grant_type", grant_param)?.parse()?;

        // Let the hook rewrite parameters, then re-pin the authoritative
        // fields to the values resolved above.
        let mut params = match &self.flow_extensions {
            Some(hook) => hook.on_before_token_grant(raw_params.clone()),
            None => raw_params.clone(),
        };
        params.insert("client_id".to_string(), client_id.clone());
        params.insert("grant_type".to_string(), grant_type.to_string());

        let requested_scopes = params::parse_delimited("scope", params.get("scope").map(String::as_str))
            .map_err(OAuthError::from)?;
        let audience =
            params::parse_delimited("audience", params.get("audience").map(String::as_str))?
                .unwrap_or_default();

        match grant_type {
            GrantType::AuthorizationCode => {
                self.build_authorization_code(&params, client_id, requested_scopes, audience)
            }
            GrantType::Password => {
                self.build_password(&params, client, client_id, requested_scopes, audience)
            }
            GrantType::ClientCredentials => {
                self.build_client_credentials(&params, client, client_id, requested_scopes, audience)
            }
            GrantType::RefreshToken => {
                self.build_refresh_token(&params, client_id, requested_scopes, audience)
            }
            // Implicit requests carry no grant of their own; they can only
            // be derived from a prior authorization request.
            GrantType::Implicit => Err(OAuthError::UnsupportedGrantType(
                "implicit requests cannot be built from token endpoint parameters".to_string(),
            )),
        }
    }

    /// Convert a prior authorization request into an implicit token
    /// request.
    ///
    /// `offline_access` is rejected outright: refresh tokens are never
    /// issued for the implicit flow.
    #[instrument(skip(self, request))]
    pub fn from_authorization_request(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<TokenRequest, OAuthError> {
        if request.scopes.iter().any(|s| s == OFFLINE_ACCESS) {
            return Err(OAuthError::InvalidScope(format!(
                "{OFFLINE_ACCESS} is not allowed for the implicit flow"
            )));
        }

        let core = TokenRequestCore {
            client_id: request.client_id.clone(),
            scopes: Some(request.scopes.clone()),
            resource_ids: request.resource_ids.clone(),
            audience: request.audience(),
            raw: HashMap::new(),
        };
        Ok(TokenRequest::Implicit {
            core,
            redirect_uri: request.redirect_uri.clone(),
        })
    }

    fn resolve_client_id(
        &self,
        params: &HashMap<String, String>,
        client: &ClientDetails,
    ) -> Result<String, OAuthError> {
        match params.get("client_id") {
            None => Ok(client.client_id.clone()),
            Some(raw) => {
                let candidate = params::validate_slug("client_id", raw)?;
                if candidate != client.client_id {
                    return Err(OAuthError::InvalidRequest(format!(
                        "client_id does not match the authenticated client ({candidate})"
                    )));
                }
                Ok(candidate)
            }
        }
    }

    /// Union of explicit `resource` parameter values and resource ids
    /// derived from the scope set.
    fn resource_ids(
        &self,
        params: &HashMap<String, String>,
        scopes: Option<&[String]>,
    ) -> Result<Vec<String>, OAuthError> {
        let mut out: Vec<String> = Vec::new();
        if let Some(raw) = params.get("resource") {
            for value in params::split_ordered(raw) {
                let uri = params::validate_uri("resource", &value)?;
                if !out.contains(&uri) {
                    out.push(uri);
                }
            }
        }
        if let Some(scopes) = scopes {
            for id in self.scope_resolver.extract_resource_ids(scopes) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    fn build_authorization_code(
        &self,
        params: &HashMap<String, String>,
        client_id: String,
        requested_scopes: Option<Vec<String>>,
        audience: Vec<String>,
    ) -> Result<TokenRequest, OAuthError> {
        let code = params
            .get("code")
            .ok_or_else(|| OAuthError::InvalidRequest("code is required".to_string()))?;
        let code = params::validate_token_string("code", code)?;

        let redirect_uri = params
            .get("redirect_uri")
            .map(|uri| params::validate_uri("redirect_uri", uri))
            .transpose()?;

        // Scopes are used exactly as requested; the granted set is bound
        // to the code itself.
        let resource_ids = self.resource_ids(params, requested_scopes.as_deref())?;
        Ok(TokenRequest::AuthorizationCode {
            core: TokenRequestCore {
                client_id,
                scopes: requested_scopes,
                resource_ids,
                audience,
                raw: params.clone(),
            },
            code,
            redirect_uri,
        })
    }

    fn build_password(
        &self,
        params: &HashMap<String, String>,
        client: &ClientDetails,
        client_id: String,
        requested_scopes: Option<Vec<String>>,
        audience: Vec<String>,
    ) -> Result<TokenRequest, OAuthError> {
        let username = params
            .get("username")
            .ok_or_else(|| OAuthError::InvalidRequest("username is required".to_string()))?;
        let username = params::validate_email("username", username)?;
        if params.get("password").map_or(true, |p| p.is_empty()) {
            return Err(OAuthError::InvalidRequest("password is required".to_string()));
        }

        let mut scopes =
            self.scope_resolver
                .resolve(requested_scopes.as_deref(), &client.scopes, false);

        // RFC 6749 permits refresh tokens here, policy does not: the
        // scope is stripped silently rather than rejected.
        if scopes.iter().any(|s| s == OFFLINE_ACCESS) {
            debug!(client_id = %client_id, "Stripping offline_access from password grant");
            scopes.retain(|s| s != OFFLINE_ACCESS);
        }

        let resource_ids = self.resource_ids(params, Some(&scopes))?;
        Ok(TokenRequest::Password {
            core: TokenRequestCore {
                client_id,
                scopes: Some(scopes),
                resource_ids,
                audience,
                raw: params.clone(),
            },
            username,
        })
    }

    fn build_client_credentials(
        &self,
        params: &HashMap<String, String>,
        client: &ClientDetails,
        client_id: String,
        requested_scopes: Option<Vec<String>>,
        audience: Vec<String>,
    ) -> Result<TokenRequest, OAuthError> {
        let scopes = self
            .scope_resolver
            .resolve(requested_scopes.as_deref(), &client.scopes, true);

        // No user, no refresh token: requesting offline_access here is a
        // hard error, not a silent strip.
        if scopes.iter().any(|s| s == OFFLINE_ACCESS) {
            return Err(OAuthError::InvalidScope(format!(
                "{OFFLINE_ACCESS} is not allowed for the client_credentials grant"
            )));
        }

        let resource_ids = self.resource_ids(params, Some(&scopes))?;
        Ok(TokenRequest::ClientCredentials {
            core: TokenRequestCore {
                client_id,
                scopes: Some(scopes),
                resource_ids,
                audience,
                raw: params.clone(),
            },
        })
    }

    fn build_refresh_token(
        &self,
        params: &HashMap<String, String>,
        client_id: String,
        requested_scopes: Option<Vec<String>>,
        audience: Vec<String>,
    ) -> Result<TokenRequest, OAuthError> {
        let refresh_token = params
            .get("refresh_token")
            .ok_or_else(|| OAuthError::InvalidRequest("refresh_token is required".to_string()))?;
        let refresh_token = params::validate_token_string("refresh_token", refresh_token)?;

        // Scopes pass through as requested; they may narrow but never
        // widen the original grant, which the token store enforces.
        let resource_ids = self.resource_ids(params, requested_scopes.as_deref())?;
        Ok(TokenRequest::RefreshToken {
            core: TokenRequestCore {
                client_id,
                scopes: requested_scopes,
                resource_ids,
                audience,
                raw: params.clone(),
            },
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aac_core::traits::InMemoryScopeRegistry;
    use aac_core::{Scope, ScopeType};

    fn resolver() -> ScopeResolver {
        ScopeResolver::new(Arc::new(InMemoryScopeRegistry::new(vec![
            Scope::new("openid", ScopeType::Generic),
            Scope::new("profile", ScopeType::User).with_resource("userinfo"),
            Scope::new(OFFLINE_ACCESS, ScopeType::Generic),
            Scope::new("admin.read", ScopeType::Client).with_resource("admin"),
        ])))
    }

    fn client() -> ClientDetails {
        let mut client = ClientDetails::new("test-client");
        client.scopes = ["openid", "profile", "offline_access", "admin.read"]
            .into_iter()
            .map(String::from)
            .collect();
        client
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_client_id_defaults_to_authenticated_client() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[("grant_type", "authorization_code"), ("code", "abc123")]),
                &client(),
            )
            .unwrap();
        assert_eq!(request.client_id(), "test-client");
        assert_eq!(request.grant_type(), GrantType::AuthorizationCode);
    }

    #[test]
    fn test_mismatched_client_id_is_invalid_request() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(
                &params(&[
                    ("grant_type", "authorization_code"),
                    ("code", "abc123"),
                    ("client_id", "someone-else"),
                ]),
                &client(),
            )
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[test]
    fn test_grant_type_is_required() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory.build(&params(&[("code", "abc")]), &client()).unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[test]
    fn test_unknown_grant_type() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(&params(&[("grant_type", "jwt-bearer")]), &client())
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedGrantType(_)));
    }

    #[test]
    fn test_authorization_code_requires_code() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(&params(&[("grant_type", "authorization_code")]), &client())
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[test]
    fn test_password_grant_strips_offline_access_silently() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[
                    ("grant_type", "password"),
                    ("username", "user@example.com"),
                    ("password", "hunter2"),
                    ("scope", "openid offline_access"),
                ]),
                &client(),
            )
            .unwrap();
        let scopes = request.scopes().unwrap();
        assert!(scopes.contains(&"openid".to_string()));
        assert!(!scopes.contains(&OFFLINE_ACCESS.to_string()));
    }

    #[test]
    fn test_password_grant_requires_email_username() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(
                &params(&[
                    ("grant_type", "password"),
                    ("username", "not-an-email"),
                    ("password", "hunter2"),
                ]),
                &client(),
            )
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[test]
    fn test_client_credentials_rejects_offline_access() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(
                &params(&[
                    ("grant_type", "client_credentials"),
                    ("scope", "openid offline_access"),
                ]),
                &client(),
            )
            .unwrap_err();
        match err {
            OAuthError::InvalidScope(msg) => assert!(msg.contains(OFFLINE_ACCESS)),
            other => panic!("expected InvalidScope, got {other:?}"),
        }
    }

    #[test]
    fn test_client_credentials_default_scopes_filtered_by_type() {
        let factory = TokenRequestFactory::new(resolver());
        let mut client = client();
        client.scopes.retain(|s| s != OFFLINE_ACCESS);
        let request = factory
            .build(&params(&[("grant_type", "client_credentials")]), &client)
            .unwrap();
        // Client flow defaults keep Client + Generic scopes only
        assert_eq!(request.scopes().unwrap(), ["openid", "admin.read"]);
    }

    #[test]
    fn test_refresh_token_scopes_pass_through() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", "rt-1"),
                    ("scope", "profile"),
                ]),
                &client(),
            )
            .unwrap();
        assert_eq!(request.scopes().unwrap(), ["profile"]);
        assert_eq!(request.resource_ids(), ["userinfo"]);
    }

    #[test]
    fn test_audience_parameter_parsed_and_deduplicated() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[
                    ("grant_type", "client_credentials"),
                    ("scope", "admin.read"),
                    ("audience", "api-one api-two,api-one"),
                ]),
                &client(),
            )
            .unwrap();
        assert_eq!(request.audience(), ["api-one", "api-two"]);
    }

    #[test]
    fn test_audience_absent_is_empty() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[("grant_type", "refresh_token"), ("refresh_token", "rt-1")]),
                &client(),
            )
            .unwrap();
        assert!(request.audience().is_empty());
    }

    #[test]
    fn test_implicit_from_raw_parameters_is_unsupported() {
        let factory = TokenRequestFactory::new(resolver());
        let err = factory
            .build(&params(&[("grant_type", "implicit")]), &client())
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedGrantType(_)));
    }

    #[test]
    fn test_implicit_from_authorization_request() {
        let factory = TokenRequestFactory::new(resolver());
        let auth = AuthorizationRequest {
            client_id: "test-client".to_string(),
            response_types: vec!["token".to_string()],
            scopes: vec!["openid".to_string()],
            resource_ids: vec![],
            redirect_uri: Some("https://app.example.com/cb".to_string()),
            state: None,
            extensions: HashMap::from([(
                crate::models::EXT_AUDIENCE.to_string(),
                serde_json::json!(["api-one"]),
            )]),
        };
        let request = factory.from_authorization_request(&auth).unwrap();
        assert_eq!(request.grant_type(), GrantType::Implicit);
        assert_eq!(request.client_id(), "test-client");
        assert_eq!(request.audience(), ["api-one"]);
    }

    #[test]
    fn test_implicit_rejects_offline_access() {
        let factory = TokenRequestFactory::new(resolver());
        let auth = AuthorizationRequest {
            client_id: "test-client".to_string(),
            response_types: vec!["token".to_string()],
            scopes: vec!["openid".to_string(), OFFLINE_ACCESS.to_string()],
            resource_ids: vec![],
            redirect_uri: None,
            state: None,
            extensions: HashMap::new(),
        };
        assert!(matches!(
            factory.from_authorization_request(&auth),
            Err(OAuthError::InvalidScope(_))
        ));
    }

    #[test]
    fn test_resource_ids_union_explicit_and_scope_derived() {
        let factory = TokenRequestFactory::new(resolver());
        let request = factory
            .build(
                &params(&[
                    ("grant_type", "password"),
                    ("username", "user@example.com"),
                    ("password", "hunter2"),
                    ("scope", "profile"),
                    ("resource", "https://files.example.com"),
                ]),
                &client(),
            )
            .unwrap();
        assert_eq!(
            request.resource_ids(),
            ["https://files.example.com", "userinfo"]
        );
    }

    #[test]
    fn test_hook_rewrites_are_repinned() {
        struct SmugglingHook;
        impl FlowExtensions for SmugglingHook {
            fn on_before_token_grant(
                &self,
                mut params: HashMap<String, String>,
            ) -> HashMap<String, String> {
                params.insert("client_id".to_string(), "evil-client".to_string());
                params.insert("grant_type".to_string(), "client_credentials".to_string());
                params.insert("scope".to_string(), "profile".to_string());
                params
            }
        }

        let factory =
            TokenRequestFactory::new(resolver()).with_flow_extensions(Arc::new(SmugglingHook));
        let request = factory
            .build(
                &params(&[
                    ("grant_type", "password"),
                    ("username", "user@example.com"),
                    ("password", "hunter2"),
                ]),
                &client(),
            )
            .unwrap();
        // The hook may rewrite scope but not client or grant
        assert_eq!(request.grant_type(), GrantType::Password);
        assert_eq!(request.client_id(), "test-client");
        assert_eq!(request.scopes().unwrap(), ["profile"]);
    }

    #[test]
    fn test_scope_comma_and_percent_encodings_normalize() {
        let factory = TokenRequestFactory::new(resolver());
        for raw in ["openid,profile", "openid%20profile", "openid profile"] {
            let request = factory
                .build(
                    &params(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", "rt"),
                        ("scope", raw),
                    ]),
                    &client(),
                )
                .unwrap();
            assert_eq!(request.scopes().unwrap(), ["openid", "profile"], "input: {raw}");
        }
    }
}
