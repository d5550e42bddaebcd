//! Authenticated principal extraction.
//!
//! Reads the bearer credential and resolves it through the identity provider.

use crate::identity::{IdentityProvider, Subject};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use secrecy::SecretString;
use tracing::error;

/// Subject behind the request plus the credential that proved it.
pub struct Principal {
    pub subject: Subject,
    pub token: SecretString,
}

/// Resolve the bearer token into a principal.
///
/// 401 for a missing or rejected credential, 503 when the identity provider
/// cannot answer.
pub async fn require_auth(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Principal, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    match identity.current_subject(&token).await {
        Ok(Some(subject)) => Ok(Principal { subject, token }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(SecretString::from(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::ExposeSecret;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        let token = extract_bearer_token(&headers);
        assert_eq!(token.as_ref().map(|token| token.expose_secret()), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz  "));
        let token = extract_bearer_token(&headers);
        assert_eq!(token.as_ref().map(|token| token.expose_secret()), Some("xyz"));
    }

    #[test]
    fn malformed_authorization_is_rejected() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
