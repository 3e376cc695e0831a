//! `at_hash` / `c_hash` computation.
//!
//! OIDC binds an ID token to its companion access token or authorization
//! code with a digest claim: the left half of the hash named by the JWS
//! algorithm, base64url-encoded without padding. The value is serialized
//! as a plain string (never a structured value) to stay compatible with
//! downstream JSON handling.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Compute the half-hash claim value for `value` under the given JWS
/// algorithm (e.g. `RS256`, `HS384`, `PS512`).
///
/// Returns `None` when the algorithm does not name a supported hash.
pub fn half_hash(alg: &str, value: &str) -> Option<String> {
    let digest: Vec<u8> = match alg.get(2..) {
        Some("256") => Sha256::digest(value.as_bytes()).to_vec(),
        Some("384") => Sha384::digest(value.as_bytes()).to_vec(),
        Some("512") => Sha512::digest(value.as_bytes()).to_vec(),
        _ => return None,
    };
    let half = &digest[..digest.len() / 2];
    Some(URL_SAFE_NO_PAD.encode(half))
}
