//! Federation error types.

use thiserror::Error;

/// Errors surfaced during entity statement and trust chain resolution.
#[derive(Debug, Error)]
pub enum FederationError {
    /// The statement endpoint could not be reached or returned an error.
    #[error("Failed to fetch entity statement for {entity_id}: {message}")]
    FetchFailed { entity_id: String, message: String },

    /// The fetched document is not a parseable entity statement.
    #[error("Invalid entity statement: {0}")]
    StatementInvalid(String),

    /// Every fetched statement for the entity was already expired.
    #[error("Entity statement for {entity_id} is expired")]
    StatementExpired { entity_id: String },

    /// No chain of statements links the entity to the trust anchor.
    #[error("No trust chain from {entity_id} to trust anchor {trust_anchor}")]
    TrustChainResolution {
        trust_anchor: String,
        entity_id: String,
    },

    /// Transport failure talking to a federation endpoint.
    #[error("Federation HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
