//! JSON Web Key models (RFC 7517 subset).
//!
//! Carries the key material the signing service resolves per client:
//! RSA public (and optionally private) components, or a symmetric `k`.
//! `JwkSet` implements structural equality so constructed signer and
//! encrypter instances can be cached and shared across clients that
//! present identical key material.

use serde::{Deserialize, Serialize};

/// A JSON Web Key as defined in RFC 7517.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (e.g. "RSA", "oct").
    pub kty: String,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Public key use ("sig" or "enc").
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm (e.g. "RS256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// RSA private exponent (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA first prime factor (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime factor (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// EC curve name (e.g. "P-256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC public point x coordinate (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC public point y coordinate (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Symmetric key value (Base64URL encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl Jwk {
    /// Whether this key carries private RSA material usable for signing.
    pub fn has_private_material(&self) -> bool {
        self.kty == "RSA" && self.n.is_some() && self.e.is_some() && self.d.is_some()
    }

    /// Whether this key carries a private EC scalar usable for signing.
    pub fn has_private_ec_material(&self) -> bool {
        self.kty == "EC" && self.crv.is_some() && self.d.is_some()
    }

    /// Whether this key is designated (or usable) for signatures.
    pub fn is_signing_key(&self) -> bool {
        match self.key_use.as_deref() {
            Some("sig") | None => true,
            _ => false,
        }
    }
}

/// A set of JSON Web Keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by key ID.
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Find a signing key, optionally by kid, else the first suitable one.
    pub fn find_signing_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| {
                k.kid.as_deref() == Some(kid) && k.is_signing_key()
            }),
            None => self.keys.iter().find(|k| k.is_signing_key()),
        }
    }

    /// Canonical cache key for this set.
    ///
    /// Serialization of the typed model is deterministic (struct field
    /// order), so equal sets always produce equal keys.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
