//! Authorization request construction.

use crate::models::authorization_request::{
    AuthorizationRequest, EXT_AUDIENCE, EXT_AUTH_TIMESTAMP, EXT_MAX_AGE, EXT_NONCE, EXT_PROMPT,
    EXT_RESPONSE_MODE,
};
use crate::params;
use crate::scope_resolver::ScopeResolver;
use aac_core::{ClientDetails, FlowExtensions, OAuthError, ResponseMode};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Query parameters the JWT `request` object is allowed to override.
const REQUEST_OBJECT_OVERRIDES: &[&str] = &[
    "state",
    "nonce",
    "redirect_uri",
    "response_mode",
    "resource",
    "audience",
    "prompt",
];

/// Builds authorization requests from raw authorization endpoint
/// parameters.
#[derive(Clone)]
pub struct AuthorizationRequestFactory {
    scope_resolver: ScopeResolver,
    flow_extensions: Option<Arc<dyn FlowExtensions>>,
}

impl AuthorizationRequestFactory {
    /// Create a factory with the given scope resolver.
    pub fn new(scope_resolver: ScopeResolver) -> Self {
        Self {
            scope_resolver,
            flow_extensions: None,
        }
    }

    /// Attach a pre-approval flow extension hook.
    #[must_use]
    pub fn with_flow_extensions(mut self, extensions: Arc<dyn FlowExtensions>) -> Self {
        self.flow_extensions = Some(extensions);
        self
    }

    /// Build an authorization request for an authenticated client.
    ///
    /// The `request_uri` parameter is not implemented and is always
    /// rejected. A JWT `request` parameter is accepted only as a plain
    /// (unsigned, unencrypted) JOSE object and only when the `openid`
    /// scope is requested; its payload values override the matching
    /// query parameters and are re-validated on the same rules.
    #[instrument(skip(self, raw_params, client), fields(client_id = %client.client_id))]
    pub fn build(
        &self,
        raw_params: &HashMap<String, String>,
        client: &ClientDetails,
    ) -> Result<AuthorizationRequest, OAuthError> {
        if raw_params.contains_key("request_uri") {
            return Err(OAuthError::UnsupportedRequestUri);
        }

        let client_id = match raw_params.get("client_id") {
            None => client.client_id.clone(),
            Some(raw) => {
                let candidate = params::validate_slug("client_id", raw)?;
                if candidate != client.client_id {
                    return Err(OAuthError::InvalidRequest(format!(
                        "client_id does not match the authenticated client ({candidate})"
                    )));
                }
                candidate
            }
        };

        let response_types = params::parse_delimited(
            "response_type",
            raw_params.get("response_type").map(String::as_str),
        )?
        .ok_or_else(|| OAuthError::InvalidRequest("response_type is required".to_string()))?;
        for rt in &response_types {
            params::validate_slug("response_type", rt)?;
        }

        let state = raw_params
            .get("state")
            .map(|s| params::validate_special("state", s))
            .transpose()?;
        let nonce = raw_params
            .get("nonce")
            .map(|n| params::validate_special("nonce", n))
            .transpose()?;

        // Let the hook rewrite parameters, then re-pin the authoritative
        // fields so the approval step sees exactly what was validated.
        let mut merged = match &self.flow_extensions {
            Some(hook) => hook.on_before_user_approval(raw_params.clone()),
            None => raw_params.clone(),
        };
        merged.insert("client_id".to_string(), client_id.clone());
        merged.insert("response_type".to_string(), response_types.join(" "));
        match &state {
            Some(state) => {
                merged.insert("state".to_string(), state.clone());
            }
            None => {
                merged.remove("state");
            }
        }
        match &nonce {
            Some(nonce) => {
                merged.insert("nonce".to_string(), nonce.clone());
            }
            None => {
                merged.remove("nonce");
            }
        }

        let requested_scopes =
            params::parse_delimited("scope", merged.get("scope").map(String::as_str))?;

        // JWT request object overrides, OIDC only.
        if let Some(request_object) = merged.remove("request") {
            let has_openid = requested_scopes
                .as_deref()
                .is_some_and(|scopes| scopes.iter().any(|s| s == "openid"));
            if !has_openid {
                return Err(OAuthError::InvalidRequestObject(
                    "request objects require the openid scope".to_string(),
                ));
            }
            let overrides = parse_plain_request_object(&request_object)?;
            for (key, value) in overrides {
                debug!(parameter = %key, "Applying request object override");
                merged.insert(key, value);
            }
        }

        let state = merged
            .get("state")
            .map(|s| params::validate_special("state", s))
            .transpose()?;
        let redirect_uri = merged
            .get("redirect_uri")
            .map(|uri| params::validate_uri("redirect_uri", uri))
            .transpose()?;

        let scopes =
            self.scope_resolver
                .resolve(requested_scopes.as_deref(), &client.scopes, false);

        let mut resource_ids: Vec<String> = Vec::new();
        if let Some(raw) = merged.get("resource") {
            for value in params::split_ordered(raw) {
                let uri = params::validate_uri("resource", &value)?;
                if !resource_ids.contains(&uri) {
                    resource_ids.push(uri);
                }
            }
        }
        for id in self.scope_resolver.extract_resource_ids(&scopes) {
            if !resource_ids.contains(&id) {
                resource_ids.push(id);
            }
        }

        let response_mode = self.resolve_response_mode(&merged, &response_types)?;

        let mut extensions: HashMap<String, Value> = HashMap::new();
        extensions.insert(
            EXT_RESPONSE_MODE.to_string(),
            Value::String(response_mode.to_string()),
        );
        if let Some(nonce) = merged
            .get("nonce")
            .map(|n| params::validate_special("nonce", n))
            .transpose()?
        {
            extensions.insert(EXT_NONCE.to_string(), Value::String(nonce));
        }
        let prompt = params::parse_delimited("prompt", merged.get("prompt").map(String::as_str))?
            .unwrap_or_default();
        if !prompt.is_empty() {
            extensions.insert(
                EXT_PROMPT.to_string(),
                Value::Array(prompt.into_iter().map(Value::String).collect()),
            );
        }
        // Audience is always recorded, even when empty.
        let audience =
            params::parse_delimited("audience", merged.get("audience").map(String::as_str))?
                .unwrap_or_default();
        extensions.insert(
            EXT_AUDIENCE.to_string(),
            Value::Array(audience.into_iter().map(Value::String).collect()),
        );
        if let Some(ts) = merged.get(EXT_AUTH_TIMESTAMP) {
            if let Ok(ts) = ts.parse::<i64>() {
                extensions.insert(EXT_AUTH_TIMESTAMP.to_string(), Value::from(ts));
            }
        }
        if let Some(max_age) = merged.get(EXT_MAX_AGE) {
            let max_age: i64 = max_age.parse().map_err(|_| {
                OAuthError::InvalidRequest("max_age must be a number of seconds".to_string())
            })?;
            extensions.insert(EXT_MAX_AGE.to_string(), Value::from(max_age));
        }

        Ok(AuthorizationRequest {
            client_id,
            response_types,
            scopes,
            resource_ids,
            redirect_uri,
            state,
            extensions,
        })
    }

    /// Explicit `response_mode` wins; otherwise fragment when any
    /// response type returns a token from the front channel, else query.
    fn resolve_response_mode(
        &self,
        params: &HashMap<String, String>,
        response_types: &[String],
    ) -> Result<ResponseMode, OAuthError> {
        if let Some(raw) = params.get("response_mode") {
            return match params::validate_slug("response_mode", raw)?.as_str() {
                "query" => Ok(ResponseMode::Query),
                "fragment" => Ok(ResponseMode::Fragment),
                other => Err(OAuthError::InvalidRequest(format!(
                    "unsupported response_mode: {other}"
                ))),
            };
        }
        let fragment = response_types
            .iter()
            .any(|rt| rt == "token" || rt == "id_token");
        Ok(if fragment {
            ResponseMode::Fragment
        } else {
            ResponseMode::Query
        })
    }
}

/// Parse a plain (alg `none`, no encryption) JOSE request object and
/// return the string-valued overrides it carries.
///
/// Any other JOSE type (signed, encrypted, or malformed) is rejected
/// as an invalid request object.
fn parse_plain_request_object(
    compact: &str,
) -> Result<HashMap<String, String>, OAuthError> {
    let segments: Vec<&str> = compact.split('.').collect();
    // A plain JWS has exactly three segments with an empty signature;
    // five segments would be a JWE.
    if segments.len() != 3 || !segments[2].is_empty() {
        return Err(OAuthError::InvalidRequestObject(
            "only plain JOSE request objects are supported".to_string(),
        ));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| OAuthError::InvalidRequestObject(format!("invalid header encoding: {e}")))?;
    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| OAuthError::InvalidRequestObject(format!("invalid header: {e}")))?;
    if header.get("alg").and_then(Value::as_str) != Some("none") || header.get("enc").is_some() {
        return Err(OAuthError::InvalidRequestObject(
            "only plain JOSE request objects are supported".to_string(),
        ));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| OAuthError::InvalidRequestObject(format!("invalid payload encoding: {e}")))?;
    let payload: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| OAuthError::InvalidRequestObject(format!("invalid payload: {e}")))?;
    let Value::Object(claims) = payload else {
        return Err(OAuthError::InvalidRequestObject(
            "request object payload must be a JSON object".to_string(),
        ));
    };

    let mut overrides = HashMap::new();
    for key in REQUEST_OBJECT_OVERRIDES {
        if let Some(value) = claims.get(*key).and_then(Value::as_str) {
            if !value.is_empty() {
                overrides.insert((*key).to_string(), value.to_string());
            }
        }
    }
    Ok(overrides)
}
