//! Cached entity statement resolution.

use crate::error::FederationError;
use crate::models::EntityStatement;
use crate::services::fetcher::EntityStatementFetcher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Default number of re-fetches after an expired statement.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Resolves entity statements through a fetcher, caching valid ones.
///
/// Statement lifetime comes from the statement's own `exp`; expired
/// entries are dropped on read and never stored. A fresh fetch that
/// still yields an expired statement is retried up to `max_retries`
/// more times, so one resolution performs at most `max_retries + 1`
/// fetches.
pub struct EntityStatementResolver {
    fetcher: Arc<dyn EntityStatementFetcher>,
    max_retries: u32,
    cache: RwLock<HashMap<String, EntityStatement>>,
}

impl EntityStatementResolver {
    pub fn new(fetcher: Arc<dyn EntityStatementFetcher>) -> Self {
        Self::with_max_retries(fetcher, DEFAULT_MAX_RETRIES)
    }

    pub fn with_max_retries(fetcher: Arc<dyn EntityStatementFetcher>, max_retries: u32) -> Self {
        Self {
            fetcher,
            max_retries,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the entity statement for `entity_id` under `trust_anchor`.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        trust_anchor: &str,
        entity_id: &str,
    ) -> Result<EntityStatement, FederationError> {
        let cache_key = format!("{trust_anchor}|{entity_id}");

        {
            let cache = self.cache.read().await;
            if let Some(statement) = cache.get(&cache_key) {
                if !statement.is_expired() {
                    return Ok(statement.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(statement) = cache.get(&cache_key) {
            if !statement.is_expired() {
                return Ok(statement.clone());
            }
            debug!(entity_id, "Dropping expired cached entity statement");
            cache.remove(&cache_key);
        }

        for attempt in 0..=self.max_retries {
            let compact = self.fetcher.fetch(trust_anchor, entity_id).await?;
            let statement = EntityStatement::parse(&compact)?;
            if statement.is_expired() {
                warn!(entity_id, attempt, "Fetched entity statement is already expired");
                continue;
            }
            cache.insert(cache_key, statement.clone());
            return Ok(statement);
        }

        Err(FederationError::StatementExpired {
            entity_id: entity_id.to_string(),
        })
    }

    /// Drop every cached statement.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn compact(entity_id: &str, exp_offset: i64) -> String {
        let claims = json!({
            "iss": entity_id,
            "sub": entity_id,
            "exp": Utc::now().timestamp() + exp_offset
        });
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{header}.{payload}.c2ln")
    }

    struct CountingFetcher {
        calls: AtomicU32,
        exp_offset: i64,
    }

    impl CountingFetcher {
        fn new(exp_offset: i64) -> Self {
            Self {
                calls: AtomicU32::new(0),
                exp_offset,
            }
        }
    }

    #[async_trait]
    impl EntityStatementFetcher for CountingFetcher {
        async fn fetch(
            &self,
            _trust_anchor: &str,
            entity_id: &str,
        ) -> Result<String, FederationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(compact(entity_id, self.exp_offset))
        }
    }

    #[tokio::test]
    async fn test_valid_statement_cached() {
        let fetcher = Arc::new(CountingFetcher::new(600));
        let resolver = EntityStatementResolver::new(fetcher.clone());

        resolver
            .resolve("https://ta.example.org", "https://rp.example.com")
            .await
            .unwrap();
        resolver
            .resolve("https://ta.example.org", "https://rp.example.com")
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_keyed_per_trust_anchor() {
        let fetcher = Arc::new(CountingFetcher::new(600));
        let resolver = EntityStatementResolver::new(fetcher.clone());

        resolver
            .resolve("https://ta-one.example.org", "https://rp.example.com")
            .await
            .unwrap();
        resolver
            .resolve("https://ta-two.example.org", "https://rp.example.com")
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_statements_retried_with_bound() {
        let fetcher = Arc::new(CountingFetcher::new(-60));
        let resolver = EntityStatementResolver::with_max_retries(fetcher.clone(), 2);

        let err = resolver
            .resolve("https://ta.example.org", "https://rp.example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, FederationError::StatementExpired { .. }));
        // max_retries + 1 fetches, no more.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_expired_statement_never_cached() {
        let fetcher = Arc::new(CountingFetcher::new(-60));
        let resolver = EntityStatementResolver::with_max_retries(fetcher.clone(), 0);

        for _ in 0..2 {
            let err = resolver
                .resolve("https://ta.example.org", "https://rp.example.com")
                .await
                .unwrap_err();
            assert!(matches!(err, FederationError::StatementExpired { .. }));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        struct FailingFetcher;
        #[async_trait]
        impl EntityStatementFetcher for FailingFetcher {
            async fn fetch(
                &self,
                _trust_anchor: &str,
                entity_id: &str,
            ) -> Result<String, FederationError> {
                Err(FederationError::FetchFailed {
                    entity_id: entity_id.to_string(),
                    message: "connection refused".to_string(),
                })
            }
        }

        let resolver = EntityStatementResolver::new(Arc::new(FailingFetcher));
        let err = resolver
            .resolve("https://ta.example.org", "https://rp.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::FetchFailed { .. }));
    }
}
