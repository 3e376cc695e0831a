//! AAC Core Library
//!
//! Shared types and traits for the AAC authorization server core.
//!
//! # Modules
//!
//! - [`error`] - OAuth2/OIDC error taxonomy (`OAuthError`)
//! - [`types`] - Request value objects and registry types (`GrantType`, `Scope`, `ClientDetails`)
//! - [`jwk`] - JSON Web Key models used for cache keying and key resolution
//! - [`traits`] - Collaborator seams (client store, scope registry, claim extractors, flow hooks)

pub mod error;
pub mod jwk;
pub mod traits;
pub mod types;

// Re-export main types for convenient access
pub use error::{OAuthError, OAuthErrorCode, OAuthErrorResponse, Result};
pub use jwk::{Jwk, JwkSet};
pub use traits::{ClaimsExtractor, ClientStore, FlowExtensions, ScopeRegistry};
pub use types::{
    ClientDetails, GrantType, ResponseMode, Scope, ScopeType, UserAuthentication,
};
