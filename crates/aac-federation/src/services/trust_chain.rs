//! Trust chain construction.

use crate::error::FederationError;
use crate::models::EntityStatement;
use crate::services::statement_resolver::EntityStatementResolver;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Upper bound on entities visited while searching for a chain.
const MAX_VISITED_ENTITIES: usize = 64;

/// Builds the chain of entity statements linking an entity to a trust
/// anchor by walking `authority_hints` breadth first, so the shortest
/// chain wins.
pub struct TrustChainResolver {
    statements: Arc<EntityStatementResolver>,
}

impl TrustChainResolver {
    pub fn new(statements: Arc<EntityStatementResolver>) -> Self {
        Self { statements }
    }

    /// Resolve the shortest trust chain from `entity_id` up to
    /// `trust_anchor`.
    ///
    /// The returned chain starts with the entity's own statement and
    /// ends with the trust anchor's. Cycles in `authority_hints` are
    /// tolerated; an exhausted search fails with a resolution error.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        trust_anchor: &str,
        entity_id: &str,
    ) -> Result<Vec<EntityStatement>, FederationError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, Vec<EntityStatement>)> = VecDeque::new();
        queue.push_back((entity_id.to_string(), Vec::new()));
        visited.insert(entity_id.to_string());

        while let Some((current, path)) = queue.pop_front() {
            let statement = match self.statements.resolve(trust_anchor, &current).await {
                Ok(statement) => statement,
                Err(e) => {
                    // A dead branch does not fail the whole search.
                    debug!(entity = %current, error = %e, "Skipping unresolvable entity");
                    continue;
                }
            };

            let mut path = path;
            path.push(statement.clone());

            if current == trust_anchor {
                debug!(chain_len = path.len(), "Trust chain resolved");
                return Ok(path);
            }

            for superior in &statement.claims.authority_hints {
                if visited.len() >= MAX_VISITED_ENTITIES {
                    break;
                }
                if visited.insert(superior.clone()) {
                    queue.push_back((superior.clone(), path.clone()));
                }
            }
        }

        Err(FederationError::TrustChainResolution {
            trust_anchor: trust_anchor.to_string(),
            entity_id: entity_id.to_string(),
        })
    }
}
