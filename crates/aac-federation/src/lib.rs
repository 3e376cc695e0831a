//! OpenID Federation support: entity statement parsing, cached
//! resolution, and trust chain construction.
//!
//! Statements are compact JWS documents; this crate decodes and
//! validates their claims and walks `authority_hints` to link an entity
//! to a configured trust anchor. Verifying statement signatures against
//! the superior's keys is left to the caller, which holds the verified
//! anchor key material.

pub mod error;
pub mod models;
pub mod services;

pub use error::FederationError;
pub use models::{EntityStatement, EntityStatementClaims};
pub use services::{
    EntityStatementFetcher, EntityStatementResolver, HttpEntityStatementFetcher,
    TrustChainResolver,
};
