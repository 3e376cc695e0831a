//! Typed token requests, one variant per grant type.

use aac_core::GrantType;
use std::collections::HashMap;

/// Fields shared by every grant type.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequestCore {
    /// Authenticated client id.
    pub client_id: String,
    /// Requested scopes in request order; `None` when the scope parameter
    /// was absent and defaults were not applicable.
    pub scopes: Option<Vec<String>>,
    /// Resource/audience identifiers the request targets.
    pub resource_ids: Vec<String>,
    /// Audiences named by the `audience` parameter, possibly empty.
    pub audience: Vec<String>,
    /// Original parameter map, preserved for extensions and audit.
    pub raw: HashMap<String, String>,
}

/// A validated token endpoint request.
///
/// The grant type is the enum variant and cannot change after
/// construction. Grant-specific required fields live on their variant so
/// they cannot be absent in a constructed value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenRequest {
    AuthorizationCode {
        core: TokenRequestCore,
        code: String,
        redirect_uri: Option<String>,
    },
    Password {
        core: TokenRequestCore,
        username: String,
    },
    ClientCredentials {
        core: TokenRequestCore,
    },
    RefreshToken {
        core: TokenRequestCore,
        refresh_token: String,
    },
    Implicit {
        core: TokenRequestCore,
        redirect_uri: Option<String>,
    },
}

impl TokenRequest {
    /// The grant type tag of this request.
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::Password { .. } => GrantType::Password,
            Self::ClientCredentials { .. } => GrantType::ClientCredentials,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
            Self::Implicit { .. } => GrantType::Implicit,
        }
    }

    fn core(&self) -> &TokenRequestCore {
        match self {
            Self::AuthorizationCode { core, .. }
            | Self::Password { core, .. }
            | Self::ClientCredentials { core }
            | Self::RefreshToken { core, .. }
            | Self::Implicit { core, .. } => core,
        }
    }

    /// The authenticated client id.
    pub fn client_id(&self) -> &str {
        &self.core().client_id
    }

    /// Requested scopes, if a scope set was supplied or resolved.
    pub fn scopes(&self) -> Option<&[String]> {
        self.core().scopes.as_deref()
    }

    /// Resource/audience identifiers the request targets.
    pub fn resource_ids(&self) -> &[String] {
        &self.core().resource_ids
    }

    /// Audiences named by the `audience` parameter.
    pub fn audience(&self) -> &[String] {
        &self.core().audience
    }

    /// The original, unmodified parameter map.
    pub fn raw(&self) -> &HashMap<String, String> {
        &self.core().raw
    }
}
