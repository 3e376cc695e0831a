//! OAuth2/OIDC request pipeline for AAC.
//!
//! This crate implements the protocol core of the authorization server:
//!
//! - **Parameter normalization** ([`params`]): pattern-constrained
//!   decoding of raw endpoint parameters with delimiter repair for
//!   malformed scope encodings.
//! - **Scope resolution** ([`scope_resolver`]): default-scope selection
//!   by registry type and scope-to-resource mapping.
//! - **Request factories** ([`services::token_factory`],
//!   [`services::authorization_factory`]): grant-type dispatch into typed
//!   token requests, and authorization request construction including JWT
//!   `request` object overrides.
//! - **ID token assembly** ([`services::id_token`]): claim merging from
//!   access-token passthrough and per-scope extractors, `at_hash`/`c_hash`
//!   binding, signing and optional encryption.
//! - **Key resolution** ([`services::key_service`]): per-client signer and
//!   encrypter construction with bounded TTL caching keyed by key material.
//!
//! Everything here is request-scoped and stateless apart from the key
//! service caches; persistence and the HTTP surface live with the host.

pub mod models;
pub mod params;
pub mod scope_resolver;
pub mod services;

pub use models::{AuthorizationRequest, TokenRequest};
pub use scope_resolver::ScopeResolver;
pub use services::authorization_factory::AuthorizationRequestFactory;
pub use services::id_token::{IdTokenBuilder, IdTokenClaims, IdTokenRequest};
pub use services::key_service::{Encrypter, KeySigningService, Signer};
pub use services::token_factory::TokenRequestFactory;
