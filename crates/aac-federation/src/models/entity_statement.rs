//! Entity statement model (OpenID Federation 1.0).

use crate::error::FederationError;
use aac_core::JwkSet;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The claim set of an entity statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStatementClaims {
    /// Issuing entity.
    pub iss: String,
    /// Subject entity the statement is about.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Federation signing keys of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,
    /// Entity ids of superiors that issue statements about this entity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authority_hints: Vec<String>,
    /// Per-entity-type metadata (OP, RP, federation entity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A parsed entity statement together with its original compact form.
///
/// Signature verification is the caller's concern; parsing only decodes
/// the payload and checks the claims a statement must carry.
#[derive(Debug, Clone)]
pub struct EntityStatement {
    pub claims: EntityStatementClaims,
    /// The compact JWS as fetched, kept for downstream verification.
    pub raw: String,
}

impl EntityStatement {
    /// Parse a compact JWS into an entity statement.
    pub fn parse(compact: &str) -> Result<Self, FederationError> {
        let compact = compact.trim();
        let segments: Vec<&str> = compact.split('.').collect();
        if segments.len() != 3 {
            return Err(FederationError::StatementInvalid(format!(
                "expected a compact JWS with 3 segments, got {}",
                segments.len()
            )));
        }

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).map_err(|e| {
            FederationError::StatementInvalid(format!("invalid payload encoding: {e}"))
        })?;
        let claims: EntityStatementClaims = serde_json::from_slice(&payload)
            .map_err(|e| FederationError::StatementInvalid(format!("invalid claims: {e}")))?;

        if claims.iss.is_empty() || claims.sub.is_empty() {
            return Err(FederationError::StatementInvalid(
                "iss and sub are required".to_string(),
            ));
        }

        Ok(Self {
            claims,
            raw: compact.to_string(),
        })
    }

    /// Whether the statement's `exp` has passed.
    pub fn is_expired(&self) -> bool {
        self.claims.exp <= Utc::now().timestamp()
    }

    /// Whether the statement is self-issued (an entity configuration).
    pub fn is_self_issued(&self) -> bool {
        self.claims.iss == self.claims.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compact(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"entity-statement+jwt"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{payload}.c2ln")
    }

    #[test]
    fn test_parse_valid_statement() {
        let statement = EntityStatement::parse(&compact(&json!({
            "iss": "https://ta.example.org",
            "sub": "https://rp.example.com",
            "exp": Utc::now().timestamp() + 600,
            "authority_hints": ["https://ta.example.org"]
        })))
        .unwrap();
        assert_eq!(statement.claims.iss, "https://ta.example.org");
        assert_eq!(statement.claims.authority_hints.len(), 1);
        assert!(!statement.is_expired());
        assert!(!statement.is_self_issued());
    }

    #[test]
    fn test_self_issued_detection() {
        let statement = EntityStatement::parse(&compact(&json!({
            "iss": "https://rp.example.com",
            "sub": "https://rp.example.com",
            "exp": Utc::now().timestamp() + 600
        })))
        .unwrap();
        assert!(statement.is_self_issued());
    }

    #[test]
    fn test_expired_statement_detected() {
        let statement = EntityStatement::parse(&compact(&json!({
            "iss": "https://ta.example.org",
            "sub": "https://rp.example.com",
            "exp": Utc::now().timestamp() - 1
        })))
        .unwrap();
        assert!(statement.is_expired());
    }

    #[test]
    fn test_missing_exp_rejected() {
        let err = EntityStatement::parse(&compact(&json!({
            "iss": "https://ta.example.org",
            "sub": "https://rp.example.com"
        })))
        .unwrap_err();
        assert!(matches!(err, FederationError::StatementInvalid(_)));
    }

    #[test]
    fn test_non_jws_rejected() {
        assert!(matches!(
            EntityStatement::parse("not-a-jws").unwrap_err(),
            FederationError::StatementInvalid(_)
        ));
        assert!(matches!(
            EntityStatement::parse("a.b").unwrap_err(),
            FederationError::StatementInvalid(_)
        ));
    }
}
