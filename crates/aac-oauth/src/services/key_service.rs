//! Per-client signing and encryption key resolution.
//!
//! Signers and encrypters are derived from whatever key material a
//! client presents: an inline JWK set, a `jwks_uri`, or just a client
//! secret. Construction is comparatively expensive (RSA key recovery,
//! PEM re-encoding), so built instances are cached by the canonical
//! serialization of the key set and shared across clients that present
//! identical material. Resolution never fails the caller: anything
//! unusable degrades to `None` with a warning, and the ID token is
//! issued unsigned-path or unencrypted accordingly.

use aac_core::{ClientDetails, Jwk, JwkSet, OAuthError};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hkdf::Hkdf;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{BigUint, RsaPrivateKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Default time-to-live for cached signer and encrypter instances.
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Maximum number of cached entries per cache before eviction.
const CACHE_MAX_ENTRIES: usize = 100;

/// HTTP timeout for `jwks_uri` fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HKDF info label for deriving content encryption keys from client
/// secrets.
const CEK_INFO: &[u8] = b"id-token-content-encryption";

/// A ready-to-use JWS signer bound to one key and algorithm.
pub struct Signer {
    algorithm: Algorithm,
    key: EncodingKey,
    kid: Option<String>,
}

impl Signer {
    /// The JWS algorithm this signer produces.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign a claim set into a compact JWS.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, OAuthError> {
        let mut header = Header::new(self.algorithm);
        header.kid = self.kid.clone();
        jsonwebtoken::encode(&header, claims, &self.key)
            .map_err(|e| OAuthError::ServerError(format!("JWS signing failed: {e}")))
    }
}

/// A ready-to-use JWE encrypter (direct key agreement, A256GCM).
pub struct Encrypter {
    cek: [u8; 32],
}

impl Encrypter {
    /// Wrap a payload (typically a signed JWT) into a compact JWE.
    pub fn encrypt(&self, payload: &str) -> Result<String, OAuthError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A256GCM"}"#);

        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.cek));
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: payload.as_bytes(),
                    aad: header.as_bytes(),
                },
            )
            .map_err(|_| OAuthError::ServerError("JWE encryption failed".to_string()))?;

        // aes-gcm appends the 16 byte tag to the ciphertext.
        let split = sealed.len() - 16;
        let (ciphertext, tag) = sealed.split_at(split);

        Ok(format!(
            "{header}..{}.{}.{}",
            URL_SAFE_NO_PAD.encode(&iv),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }
}

struct CachedEntry<T> {
    value: Option<Arc<T>>,
    fetched_at: Instant,
}

impl<T> CachedEntry<T> {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > CACHE_TTL
    }
}

/// Resolves and caches per-client [`Signer`] and [`Encrypter`] instances.
pub struct KeySigningService {
    http_client: reqwest::Client,
    signers: RwLock<HashMap<String, CachedEntry<Signer>>>,
    encrypters: RwLock<HashMap<String, CachedEntry<Encrypter>>>,
    remote_jwks: RwLock<HashMap<String, CachedEntry<JwkSet>>>,
}

impl Default for KeySigningService {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySigningService {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            signers: RwLock::new(HashMap::new()),
            encrypters: RwLock::new(HashMap::new()),
            remote_jwks: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a signer for the client's key material and preferred
    /// algorithm.
    ///
    /// Returns `None` when no usable key exists. Negative results are
    /// cached as well so a broken key set is not re-parsed per token.
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    pub async fn get_signer(&self, client: &ClientDetails) -> Option<Arc<Signer>> {
        let jwks = self.resolve_jwks(client).await?;
        let alg = client.signing_alg.as_deref().unwrap_or("RS256");
        let cache_key = format!("{alg}:{}", jwks.cache_key());

        {
            let signers = self.signers.read().await;
            if let Some(entry) = signers.get(&cache_key) {
                if !entry.is_expired() {
                    return entry.value.clone();
                }
            }
        }

        // Holding the write lock through construction keeps concurrent
        // callers from building the same signer twice.
        let mut signers = self.signers.write().await;
        if let Some(entry) = signers.get(&cache_key) {
            if !entry.is_expired() {
                return entry.value.clone();
            }
        }

        let signer = build_signer(&jwks, alg).map(Arc::new);
        if signer.is_none() {
            warn!(alg, "No usable signing key for client");
        }
        if signers.len() >= CACHE_MAX_ENTRIES {
            evict_oldest(&mut signers);
        }
        signers.insert(
            cache_key,
            CachedEntry {
                value: signer.clone(),
                fetched_at: Instant::now(),
            },
        );
        signer
    }

    /// Resolve an encrypter for the client's requested JWE encryption.
    ///
    /// Only direct symmetric encryption (`A256GCM` from the client
    /// secret) is supported; any other configuration resolves to `None`.
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    pub async fn get_encrypter(&self, client: &ClientDetails) -> Option<Arc<Encrypter>> {
        let method = client.encryption_method.as_deref()?;
        if method != "A256GCM" {
            warn!(method, "Unsupported ID token encryption method");
            return None;
        }
        let Some(secret) = client.client_secret.as_deref() else {
            warn!("Client requests ID token encryption but has no secret");
            return None;
        };

        // Keyed by a digest of the key material, not the client id, so
        // clients sharing a secret share the instance and a rotated
        // secret misses the cache immediately.
        let digest = Sha256::digest(secret.as_bytes());
        let cache_key = format!("{method}:{}", URL_SAFE_NO_PAD.encode(digest));

        {
            let encrypters = self.encrypters.read().await;
            if let Some(entry) = encrypters.get(&cache_key) {
                if !entry.is_expired() {
                    return entry.value.clone();
                }
            }
        }

        let mut encrypters = self.encrypters.write().await;
        if let Some(entry) = encrypters.get(&cache_key) {
            if !entry.is_expired() {
                return entry.value.clone();
            }
        }

        let mut cek = [0u8; 32];
        let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let encrypter = match hkdf.expand(CEK_INFO, &mut cek) {
            Ok(()) => Some(Arc::new(Encrypter { cek })),
            Err(_) => {
                warn!("Content encryption key derivation failed");
                None
            }
        };
        if encrypters.len() >= CACHE_MAX_ENTRIES {
            evict_oldest(&mut encrypters);
        }
        encrypters.insert(
            cache_key,
            CachedEntry {
                value: encrypter.clone(),
                fetched_at: Instant::now(),
            },
        );
        encrypter
    }

    /// Key material precedence: inline `jwks`, then `jwks_uri`, then a
    /// symmetric set derived from the client secret.
    async fn resolve_jwks(&self, client: &ClientDetails) -> Option<JwkSet> {
        if let Some(jwks) = &client.jwks {
            return Some(jwks.clone());
        }
        if let Some(uri) = &client.jwks_uri {
            return self.fetch_jwks(uri).await;
        }
        client.client_secret.as_deref().map(secret_jwks)
    }

    async fn fetch_jwks(&self, uri: &str) -> Option<JwkSet> {
        {
            let cache = self.remote_jwks.read().await;
            if let Some(entry) = cache.get(uri) {
                if !entry.is_expired() {
                    return entry.value.as_deref().cloned();
                }
            }
        }

        let mut cache = self.remote_jwks.write().await;
        if let Some(entry) = cache.get(uri) {
            if !entry.is_expired() {
                return entry.value.as_deref().cloned();
            }
        }

        debug!(uri, "Fetching client JWKS");
        let fetched = match self.http_client.get(uri).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<JwkSet>().await {
                    Ok(jwks) => Some(Arc::new(jwks)),
                    Err(e) => {
                        warn!(uri, error = %e, "Failed to parse client JWKS");
                        None
                    }
                },
                Err(e) => {
                    warn!(uri, error = %e, "Client JWKS fetch returned an error status");
                    None
                }
            },
            Err(e) => {
                warn!(uri, error = %e, "Client JWKS fetch failed");
                None
            }
        };

        if cache.len() >= CACHE_MAX_ENTRIES {
            evict_oldest(&mut cache);
        }
        cache.insert(
            uri.to_string(),
            CachedEntry {
                value: fetched.clone(),
                fetched_at: Instant::now(),
            },
        );
        fetched.as_deref().cloned()
    }
}

fn evict_oldest<T>(cache: &mut HashMap<String, CachedEntry<T>>) {
    if let Some(key) = cache
        .iter()
        .min_by_key(|(_, entry)| entry.fetched_at)
        .map(|(key, _)| key.clone())
    {
        cache.remove(&key);
    }
}

/// Symmetric JWK set derived from a client secret, for HS* signing.
fn secret_jwks(secret: &str) -> JwkSet {
    JwkSet {
        keys: vec![Jwk {
            kty: "oct".to_string(),
            kid: None,
            key_use: Some("sig".to_string()),
            alg: None,
            n: None,
            e: None,
            d: None,
            p: None,
            q: None,
            crv: None,
            x: None,
            y: None,
            k: Some(URL_SAFE_NO_PAD.encode(secret.as_bytes())),
        }],
    }
}

fn build_signer(jwks: &JwkSet, alg: &str) -> Option<Signer> {
    let algorithm = match Algorithm::from_str(alg) {
        Ok(algorithm) => algorithm,
        Err(_) => {
            warn!(alg, "Unknown JWS algorithm");
            return None;
        }
    };

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            let key = jwks.keys.iter().find(|k| k.kty == "oct" && k.k.is_some())?;
            let raw = decode_b64(key.k.as_deref()?, "k")?;
            Some(Signer {
                algorithm,
                key: EncodingKey::from_secret(&raw),
                kid: key.kid.clone(),
            })
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => {
            let key = jwks
                .keys
                .iter()
                .find(|k| k.is_signing_key() && k.has_private_material())?;
            let encoding_key = rsa_encoding_key(key)?;
            Some(Signer {
                algorithm,
                key: encoding_key,
                kid: key.kid.clone(),
            })
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            let key = jwks
                .keys
                .iter()
                .find(|k| k.is_signing_key() && k.has_private_ec_material())?;
            let encoding_key = ec_encoding_key(key)?;
            Some(Signer {
                algorithm,
                key: encoding_key,
                kid: key.kid.clone(),
            })
        }
        _ => {
            warn!(alg, "JWS algorithm not supported for ID token signing");
            None
        }
    }
}

/// Rebuild an RSA private key from its JWK components and re-encode it
/// as PKCS#8 PEM, the form `jsonwebtoken` accepts.
fn rsa_encoding_key(jwk: &Jwk) -> Option<EncodingKey> {
    let n = BigUint::from_bytes_be(&decode_b64(jwk.n.as_deref()?, "n")?);
    let e = BigUint::from_bytes_be(&decode_b64(jwk.e.as_deref()?, "e")?);
    let d = BigUint::from_bytes_be(&decode_b64(jwk.d.as_deref()?, "d")?);
    let mut primes = Vec::new();
    if let (Some(p), Some(q)) = (jwk.p.as_deref(), jwk.q.as_deref()) {
        primes.push(BigUint::from_bytes_be(&decode_b64(p, "p")?));
        primes.push(BigUint::from_bytes_be(&decode_b64(q, "q")?));
    }

    // With no primes supplied they are recovered from (n, e, d).
    let private_key = match RsaPrivateKey::from_components(n, e, d, primes) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Invalid RSA private key components");
            return None;
        }
    };
    let pem = match private_key.to_pkcs8_pem(LineEnding::LF) {
        Ok(pem) => pem,
        Err(e) => {
            warn!(error = %e, "RSA key PEM encoding failed");
            return None;
        }
    };
    match EncodingKey::from_rsa_pem(pem.as_bytes()) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "RSA key rejected by JWT library");
            None
        }
    }
}

/// Rebuild an EC private key from its JWK scalar and re-encode it as
/// PKCS#8 PEM. The curve comes from `crv`; `x`/`y` are not needed since
/// the public point is derived from the scalar.
fn ec_encoding_key(jwk: &Jwk) -> Option<EncodingKey> {
    let scalar = decode_b64(jwk.d.as_deref()?, "d")?;
    let pem = match jwk.crv.as_deref()? {
        "P-256" => match p256::SecretKey::from_slice(&scalar) {
            Ok(key) => key.to_pkcs8_pem(LineEnding::LF).ok()?,
            Err(e) => {
                warn!(error = %e, "Invalid P-256 private scalar");
                return None;
            }
        },
        "P-384" => match p384::SecretKey::from_slice(&scalar) {
            Ok(key) => key.to_pkcs8_pem(LineEnding::LF).ok()?,
            Err(e) => {
                warn!(error = %e, "Invalid P-384 private scalar");
                return None;
            }
        },
        crv => {
            warn!(crv, "Unsupported EC curve for ID token signing");
            return None;
        }
    };
    match EncodingKey::from_ec_pem(pem.as_bytes()) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "EC key rejected by JWT library");
            None
        }
    }
}

fn decode_b64(value: &str, field: &str) -> Option<Vec<u8>> {
    match URL_SAFE_NO_PAD.decode(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(field, error = %e, "Invalid Base64URL in JWK");
            None
        }
    }
}
