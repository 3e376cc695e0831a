//! Entity statement transport.

use crate::error::FederationError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP timeout for federation endpoint calls.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Well-known path serving an entity's configuration statement.
const WELL_KNOWN_PATH: &str = ".well-known/openid-federation";

/// Retrieves the compact JWS of an entity statement.
///
/// The trust anchor is passed through so implementations can route
/// through an anchor-operated fetch or resolve endpoint.
#[async_trait]
pub trait EntityStatementFetcher: Send + Sync {
    async fn fetch(&self, trust_anchor: &str, entity_id: &str)
        -> Result<String, FederationError>;
}

/// Fetches entity configurations from the subject's well-known endpoint.
pub struct HttpEntityStatementFetcher {
    http_client: reqwest::Client,
}

impl Default for HttpEntityStatementFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpEntityStatementFetcher {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http_client }
    }
}

#[async_trait]
impl EntityStatementFetcher for HttpEntityStatementFetcher {
    #[instrument(skip(self))]
    async fn fetch(
        &self,
        _trust_anchor: &str,
        entity_id: &str,
    ) -> Result<String, FederationError> {
        let url = format!("{}/{WELL_KNOWN_PATH}", entity_id.trim_end_matches('/'));
        debug!(url, "Fetching entity configuration");

        let response = self.http_client.get(&url).send().await?;
        let response = response.error_for_status().map_err(|e| {
            FederationError::FetchFailed {
                entity_id: entity_id.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(response.text().await?)
    }
}
