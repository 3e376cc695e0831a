//! Scope resolution against the scope registry.

use aac_core::{Scope, ScopeRegistry, ScopeType};
use std::sync::Arc;
use tracing::debug;

/// Resolves requested scopes and maps scopes to resource identifiers.
///
/// When no registry is configured the resolver fails open: the default
/// scope set is the client's full allowed set, unfiltered.
#[derive(Clone, Default)]
pub struct ScopeResolver {
    registry: Option<Arc<dyn ScopeRegistry>>,
}

impl ScopeResolver {
    /// Create a resolver backed by a scope registry.
    pub fn new(registry: Arc<dyn ScopeRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Create a resolver with no registry (fail-open defaults).
    #[must_use]
    pub fn unregistered() -> Self {
        Self { registry: None }
    }

    /// Resolve the effective scope set for a request.
    ///
    /// With no requested scopes the default is the client's allowed set,
    /// filtered by registry type: client-credential flows keep `Client`
    /// and `Generic` scopes, user flows keep `User` and `Generic`.
    /// Unregistered scopes are excluded from the default set.
    ///
    /// Explicitly requested scopes pass through untouched; validating
    /// requested-vs-allowed is the caller's responsibility.
    pub fn resolve(
        &self,
        requested: Option<&[String]>,
        client_scopes: &[String],
        is_client_flow: bool,
    ) -> Vec<String> {
        if let Some(requested) = requested {
            return requested.to_vec();
        }

        let Some(registry) = &self.registry else {
            return client_scopes.to_vec();
        };

        let defaults: Vec<String> = client_scopes
            .iter()
            .filter(|key| {
                registry.lookup(key).is_some_and(|scope| {
                    matches!(
                        (is_client_flow, scope.scope_type),
                        (true, ScopeType::Client | ScopeType::Generic)
                            | (false, ScopeType::User | ScopeType::Generic)
                    )
                })
            })
            .cloned()
            .collect();

        debug!(
            is_client_flow,
            defaulted = defaults.len(),
            allowed = client_scopes.len(),
            "Resolved default scope set"
        );
        defaults
    }

    /// Extract the resource/audience identifiers a scope set refers to.
    ///
    /// For each registered scope, the owning resource id and the declared
    /// audience list are unioned. Unknown scopes contribute nothing.
    pub fn extract_resource_ids(&self, scopes: &[String]) -> Vec<String> {
        let Some(registry) = &self.registry else {
            return Vec::new();
        };

        let mut out: Vec<String> = Vec::new();
        let mut push = |id: &str, out: &mut Vec<String>| {
            if !out.iter().any(|existing| existing == id) {
                out.push(id.to_string());
            }
        };

        for key in scopes {
            let Some(Scope {
                resource_id,
                audience,
                ..
            }) = registry.lookup(key)
            else {
                continue;
            };
            if let Some(resource_id) = &resource_id {
                push(resource_id, &mut out);
            }
            for aud in &audience {
                push(aud, &mut out);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aac_core::traits::InMemoryScopeRegistry;

    fn registry() -> Arc<dyn ScopeRegistry> {
        Arc::new(InMemoryScopeRegistry::new(vec![
            Scope::new("openid", ScopeType::Generic),
            Scope::new("profile", ScopeType::User).with_resource("userinfo"),
            Scope::new("email", ScopeType::User).with_resource("userinfo"),
            Scope::new("admin.read", ScopeType::Client)
                .with_resource("admin")
                .with_audience(vec!["admin-api".to_string()]),
        ]))
    }

    fn client_scopes() -> Vec<String> {
        ["openid", "profile", "email", "admin.read", "not.registered"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_requested_scopes_pass_through() {
        let resolver = ScopeResolver::new(registry());
        let requested = vec!["anything".to_string(), "goes".to_string()];
        let resolved = resolver.resolve(Some(&requested), &client_scopes(), false);
        assert_eq!(resolved, requested);
    }

    #[test]
    fn test_default_user_flow_keeps_user_and_generic() {
        let resolver = ScopeResolver::new(registry());
        let resolved = resolver.resolve(None, &client_scopes(), false);
        assert_eq!(resolved, ["openid", "profile", "email"]);
    }

    #[test]
    fn test_default_client_flow_keeps_client_and_generic() {
        let resolver = ScopeResolver::new(registry());
        let resolved = resolver.resolve(None, &client_scopes(), true);
        assert_eq!(resolved, ["openid", "admin.read"]);
    }

    #[test]
    fn test_unregistered_scope_dropped_from_defaults() {
        let resolver = ScopeResolver::new(registry());
        let resolved = resolver.resolve(None, &client_scopes(), false);
        assert!(!resolved.contains(&"not.registered".to_string()));
    }

    #[test]
    fn test_no_registry_fails_open() {
        let resolver = ScopeResolver::unregistered();
        let resolved = resolver.resolve(None, &client_scopes(), true);
        assert_eq!(resolved, client_scopes());
    }

    #[test]
    fn test_extract_resource_ids_unions_resource_and_audience() {
        let resolver = ScopeResolver::new(registry());
        let scopes: Vec<String> = ["profile", "admin.read", "unknown"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            resolver.extract_resource_ids(&scopes),
            ["userinfo", "admin", "admin-api"]
        );
    }

    #[test]
    fn test_extract_resource_ids_unknown_contribute_nothing() {
        let resolver = ScopeResolver::new(registry());
        assert!(resolver
            .extract_resource_ids(&["nope".to_string()])
            .is_empty());
    }
}
