//! Inbound parameter normalization and validation.
//!
//! Each endpoint parameter is trimmed and validated against the character
//! class appropriate to its semantic role before any further processing.
//! Violations surface as [`ParamError`] carrying the parameter name and
//! the original diagnostic, which callers convert into an
//! `invalid_request` protocol error.

use aac_core::OAuthError;

/// Maximum accepted length for identifier-like parameters.
const MAX_SLUG_LEN: usize = 128;

/// Maximum accepted length for opaque token parameters.
const MAX_TOKEN_LEN: usize = 2048;

/// Maximum accepted length for state/nonce parameters.
const MAX_SPECIAL_LEN: usize = 512;

/// A local validation failure for a single parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ParamError {
    pub name: String,
    pub message: String,
}

impl ParamError {
    fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<ParamError> for OAuthError {
    fn from(err: ParamError) -> Self {
        OAuthError::InvalidRequest(err.to_string())
    }
}

/// Validate an identifier-like value (client_id, grant_type, response_mode).
///
/// Alphanumeric plus `-`, `_` and `.`, between 1 and 128 characters.
pub fn validate_slug(name: &str, value: &str) -> Result<String, ParamError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_SLUG_LEN {
        return Err(ParamError::new(
            name,
            format!("must be between 1 and {MAX_SLUG_LEN} characters"),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ParamError::new(
            name,
            "must contain only alphanumeric characters, -, _ and .",
        ));
    }
    Ok(value.to_string())
}

/// Validate an opaque token value (authorization code, refresh token).
///
/// Printable ASCII without whitespace, up to 2048 characters.
pub fn validate_token_string(name: &str, value: &str) -> Result<String, ParamError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_TOKEN_LEN {
        return Err(ParamError::new(
            name,
            format!("must be between 1 and {MAX_TOKEN_LEN} characters"),
        ));
    }
    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ParamError::new(
            name,
            "must contain only printable non-whitespace ASCII",
        ));
    }
    Ok(value.to_string())
}

/// Validate an email-shaped username.
pub fn validate_email(name: &str, value: &str) -> Result<String, ParamError> {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ParamError::new(name, "must be a valid email address"));
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    let local_ok = !local.is_empty()
        && local.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '%')
        });
    if !local_ok || !domain_ok {
        return Err(ParamError::new(name, "must be a valid email address"));
    }
    Ok(value.to_string())
}

/// Validate an absolute URI (redirect_uri, resource).
pub fn validate_uri(name: &str, value: &str) -> Result<String, ParamError> {
    let value = value.trim();
    let scheme_end = value.find("://");
    let scheme_ok = match scheme_end {
        Some(idx) if idx > 0 => value[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        _ => false,
    };
    if !scheme_ok || value.len() == scheme_end.unwrap_or(0) + 3 {
        return Err(ParamError::new(name, "must be an absolute URI"));
    }
    if value.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(ParamError::new(
            name,
            "must not contain whitespace or a fragment",
        ));
    }
    Ok(value.to_string())
}

/// Validate a state/nonce value.
///
/// Deliberately permissive to tolerate most legal OAuth2 state encodings:
/// any printable ASCII except characters unsafe when reflected into a
/// redirect (`<`, `>`, `"`, `\`, backtick).
pub fn validate_special(name: &str, value: &str) -> Result<String, ParamError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_SPECIAL_LEN {
        return Err(ParamError::new(
            name,
            format!("must be between 1 and {MAX_SPECIAL_LEN} characters"),
        ));
    }
    if !value
        .chars()
        .all(|c| (' '..='~').contains(&c) && !matches!(c, '<' | '>' | '"' | '\\' | '`'))
    {
        return Err(ParamError::new(
            name,
            "contains characters that are not allowed",
        ));
    }
    Ok(value.to_string())
}

/// Repair malformed delimiters in a space-delimited list.
///
/// Some clients send literal `%20` sequences or comma-separated values
/// instead of the space-delimited encoding RFC 6749 prescribes; both are
/// normalized to spaces before splitting.
pub fn repair_delimiters(value: &str) -> String {
    value.replace("%20", " ").replace(',', " ")
}

/// Split a space-delimited string into an ordered, duplicate-free list.
///
/// Insertion order is preserved for audit fidelity; duplicates collapse
/// to their first occurrence.
pub fn split_ordered(value: &str) -> Vec<String> {
    let repaired = repair_delimiters(value);
    let mut out: Vec<String> = Vec::new();
    for item in repaired.split_whitespace() {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Parse an optional space-delimited list parameter.
///
/// An absent parameter yields `None` (not an empty set) so that
/// downstream default-scope logic activates; a present parameter is
/// validated and split.
pub fn parse_delimited(
    name: &str,
    value: Option<&str>,
) -> Result<Option<Vec<String>>, ParamError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let raw = raw.trim();
            if !raw
                .chars()
                .all(|c| (' '..='~').contains(&c) && !matches!(c, '<' | '>' | '"' | '\\'))
            {
                return Err(ParamError::new(
                    name,
                    "contains characters that are not allowed",
                ));
            }
            Ok(Some(split_ordered(raw)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_accepts_identifiers() {
        assert_eq!(validate_slug("client_id", " my-client.1 ").unwrap(), "my-client.1");
        assert!(validate_slug("client_id", "").is_err());
        assert!(validate_slug("client_id", "bad client").is_err());
        assert!(validate_slug("client_id", "semi;colon").is_err());
    }

    #[test]
    fn test_token_string_rejects_whitespace() {
        assert!(validate_token_string("code", "abc def").is_err());
        assert_eq!(validate_token_string("code", "SplxlOBeZQQYbYS6WxSbIA").unwrap().len(), 22);
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("username", "a@b.com").is_ok());
        assert!(validate_email("username", "first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("username", "not-an-email").is_err());
        assert!(validate_email("username", "a@b").is_err());
        assert!(validate_email("username", "@b.com").is_err());
    }

    #[test]
    fn test_uri_requires_absolute() {
        assert!(validate_uri("redirect_uri", "https://app.example.com/cb").is_ok());
        assert!(validate_uri("redirect_uri", "custom+scheme://cb").is_ok());
        assert!(validate_uri("redirect_uri", "/relative/path").is_err());
        assert!(validate_uri("redirect_uri", "https://x/cb#frag").is_err());
        assert!(validate_uri("redirect_uri", "https://x/c b").is_err());
    }

    #[test]
    fn test_special_is_permissive_but_bounded() {
        assert!(validate_special("state", "af0ifjsldkj~.-_=+/:").is_ok());
        assert!(validate_special("state", "has<angle").is_err());
        assert!(validate_special("state", "").is_err());
    }

    #[test]
    fn test_delimiter_repair_variants() {
        // "a,b", "a%20b" and "a b" all normalize to the same ordered set
        for raw in ["a,b", "a%20b", "a b"] {
            assert_eq!(split_ordered(raw), ["a", "b"], "input: {raw}");
        }
    }

    #[test]
    fn test_split_collapses_duplicates_preserving_order() {
        assert_eq!(split_ordered("openid email openid profile"), ["openid", "email", "profile"]);
    }

    #[test]
    fn test_absent_list_is_none_not_empty() {
        assert_eq!(parse_delimited("scope", None).unwrap(), None);
        assert_eq!(
            parse_delimited("scope", Some("openid profile")).unwrap(),
            Some(vec!["openid".to_string(), "profile".to_string()])
        );
    }

    #[test]
    fn test_param_error_converts_to_invalid_request() {
        let err: OAuthError = validate_slug("grant_type", "no spaces allowed").unwrap_err().into();
        assert!(matches!(err, OAuthError::InvalidRequest(ref msg) if msg.starts_with("grant_type:")));
    }
}
