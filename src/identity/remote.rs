//! HTTP identity provider client.
//!
//! Resolves bearer tokens against the identity service:
//! - `GET  {base}/v1/auth/session` returns the subject (`200`) or `401`.
//! - `POST {base}/v1/auth/logout` ends the session.

use super::{IdentityError, IdentityFuture, IdentityProvider, Subject};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RemoteIdentityProvider {
    base_url: Url,
    client: Client,
}

impl RemoteIdentityProvider {
    /// Build a client for the identity service at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or not http(s), or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid identity provider URL: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Identity provider URL must use http or https: {base_url}"
            ));
        }

        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

impl IdentityProvider for RemoteIdentityProvider {
    fn current_subject<'a>(&'a self, token: &'a SecretString) -> IdentityFuture<'a, Option<Subject>> {
        Box::pin(current_subject(self, token))
    }

    fn sign_out<'a>(&'a self, token: &'a SecretString) -> IdentityFuture<'a, ()> {
        Box::pin(sign_out(self, token))
    }
}

#[instrument(skip(provider, token))]
async fn current_subject(
    provider: &RemoteIdentityProvider,
    token: &SecretString,
) -> Result<Option<Subject>, IdentityError> {
    let url = provider.endpoint("/v1/auth/session");
    let response = provider
        .client
        .get(&url)
        .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
        .send()
        .await
        .map_err(|err| {
            error!("Error reaching identity provider: {err}");
            IdentityError::Unavailable(err.to_string())
        })?;

    match response.status() {
        StatusCode::OK => {
            let subject: Subject = response
                .json()
                .await
                .map_err(|err| IdentityError::InvalidResponse(err.to_string()))?;
            if subject.subject_id.trim().is_empty() {
                return Err(IdentityError::InvalidResponse(
                    "empty subject_id".to_string(),
                ));
            }
            Ok(Some(subject))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            debug!("Identity provider rejected the session");
            Ok(None)
        }
        status => {
            error!("Identity provider session lookup failed: {status}");
            Err(IdentityError::Unavailable(format!("{url} - {status}")))
        }
    }
}

#[instrument(skip(provider, token))]
async fn sign_out(provider: &RemoteIdentityProvider, token: &SecretString) -> Result<(), IdentityError> {
    let url = provider.endpoint("/v1/auth/logout");
    let response = provider
        .client
        .post(&url)
        .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
        .send()
        .await
        .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

    let status = response.status();
    // An already-dead session is as signed out as it gets.
    if status.is_success() || status == StatusCode::UNAUTHORIZED {
        Ok(())
    } else {
        Err(IdentityError::Unavailable(format!("{url} - {status}")))
    }
}
