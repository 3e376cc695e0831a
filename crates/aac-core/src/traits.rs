//! Collaborator seams for the request pipeline.
//!
//! The pipeline treats client storage, the scope registry and per-scope
//! claim extraction as external collaborators behind narrow traits, so
//! the core stays independent of any persistence or framework layer.

use crate::error::OAuthError;
use crate::types::{ClientDetails, Scope, UserAuthentication};
use serde_json::Value;
use std::collections::HashMap;

/// Lookup of registered clients by client id.
pub trait ClientStore: Send + Sync {
    /// Resolve a client. Unknown ids fail with [`OAuthError::InvalidClient`].
    fn lookup(&self, client_id: &str) -> Result<ClientDetails, OAuthError>;
}

/// Registry of scope definitions keyed by scope string.
///
/// Unknown scopes return `None`; callers treat them as unregistered and
/// silently drop them during default-scope resolution and resource-id
/// extraction rather than raising errors.
pub trait ScopeRegistry: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Scope>;
}

/// Per-scope claim extraction for ID token assembly.
///
/// Extractors return a flat claim map (one level, no nested objects).
pub trait ClaimsExtractor: Send + Sync {
    fn extract(&self, user: &UserAuthentication) -> Result<HashMap<String, Value>, OAuthError>;
}

/// Optional pre-processing hooks invoked before grant and approval steps.
///
/// Hooks receive the raw parameter map and return a possibly rewritten
/// copy. Authoritative fields (client id, grant type, response type,
/// state, nonce) are re-pinned by the factories after the hook runs, so
/// a hook cannot smuggle a different client or grant through.
pub trait FlowExtensions: Send + Sync {
    /// Invoked before a token grant is dispatched.
    fn on_before_token_grant(
        &self,
        params: HashMap<String, String>,
    ) -> HashMap<String, String> {
        params
    }

    /// Invoked before user approval of an authorization request.
    fn on_before_user_approval(
        &self,
        params: HashMap<String, String>,
    ) -> HashMap<String, String> {
        params
    }
}

/// In-memory scope registry, convenient for composition and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScopeRegistry {
    scopes: HashMap<String, Scope>,
}

impl InMemoryScopeRegistry {
    pub fn new(scopes: Vec<Scope>) -> Self {
        Self {
            scopes: scopes.into_iter().map(|s| (s.key.clone(), s)).collect(),
        }
    }
}

impl ScopeRegistry for InMemoryScopeRegistry {
    fn lookup(&self, key: &str) -> Option<Scope> {
        self.scopes.get(key).cloned()
    }
}
