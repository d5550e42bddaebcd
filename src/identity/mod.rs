//! Identity provider seam.
//!
//! The identity provider authenticates the human and issues the stable subject
//! identifier every OTP record is keyed by. This service never sees passwords;
//! it only resolves a bearer credential to a [`Subject`].

mod remote;

pub use remote::RemoteIdentityProvider;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin};
use utoipa::ToSchema;

pub type IdentityFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, IdentityError>> + Send + 'a>>;

/// Authenticated subject as reported by the identity provider.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub subject_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

pub trait IdentityProvider: Send + Sync {
    /// Resolve the bearer credential to its subject, `None` when the session
    /// is missing, expired or revoked.
    fn current_subject<'a>(&'a self, token: &'a SecretString) -> IdentityFuture<'a, Option<Subject>>;

    /// End the session behind the credential.
    fn sign_out<'a>(&'a self, token: &'a SecretString) -> IdentityFuture<'a, ()>;
}
