//! Authorization request model.

use aac_core::ResponseMode;
use serde_json::Value;
use std::collections::HashMap;

/// Extension key carrying the resolved response mode.
pub const EXT_RESPONSE_MODE: &str = "response_mode";
/// Extension key carrying the request nonce.
pub const EXT_NONCE: &str = "nonce";
/// Extension key carrying the parsed prompt set.
pub const EXT_PROMPT: &str = "prompt";
/// Extension key carrying the requested audience set (always present).
pub const EXT_AUDIENCE: &str = "audience";
/// Extension key carrying the authentication timestamp, when recorded.
pub const EXT_AUTH_TIMESTAMP: &str = "auth_timestamp";
/// Extension key carrying a requested `max_age` in seconds.
pub const EXT_MAX_AGE: &str = "max_age";

/// A validated authorization endpoint request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    /// Authenticated client id.
    pub client_id: String,
    /// Requested response types (`code`, `token`, `id_token`), ordered.
    pub response_types: Vec<String>,
    /// Resolved scope set.
    pub scopes: Vec<String>,
    /// Resource/audience identifiers derived from `resource` and scopes.
    pub resource_ids: Vec<String>,
    /// Redirect URI, when supplied.
    pub redirect_uri: Option<String>,
    /// Opaque state value, when supplied.
    pub state: Option<String>,
    /// Request extensions (response mode, nonce, prompt, audience, ...).
    pub extensions: HashMap<String, Value>,
}

impl AuthorizationRequest {
    /// The resolved response mode.
    pub fn response_mode(&self) -> Option<ResponseMode> {
        match self.extensions.get(EXT_RESPONSE_MODE)?.as_str()? {
            "query" => Some(ResponseMode::Query),
            "fragment" => Some(ResponseMode::Fragment),
            _ => None,
        }
    }

    /// The request nonce, when present.
    pub fn nonce(&self) -> Option<&str> {
        self.extensions.get(EXT_NONCE)?.as_str()
    }

    /// Audiences from the `audience` extension, possibly empty.
    pub fn audience(&self) -> Vec<String> {
        self.extensions
            .get(EXT_AUDIENCE)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
