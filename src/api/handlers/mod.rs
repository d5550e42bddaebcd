//! API handlers and the response shapes they share.

pub mod account;
pub mod health;
pub mod otp;
pub mod principal;
pub mod registration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// Body returned by the OTP and registration endpoints.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OtpResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

impl OtpResponse {
    pub(crate) fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            remaining_attempts: None,
            remaining_seconds: None,
        }
    }

    pub(crate) fn with_attempts(mut self, remaining_attempts: u32) -> Self {
        self.remaining_attempts = Some(remaining_attempts);
        self
    }

    pub(crate) fn with_seconds(mut self, remaining_seconds: u64) -> Self {
        self.remaining_seconds = Some(remaining_seconds);
        self
    }
}

pub(crate) fn reply(status: StatusCode, body: OtpResponse) -> Response {
    (status, Json(body)).into_response()
}

/// Store faults never turn into a verdict; the caller is asked to retry.
pub(crate) fn store_unavailable(err: &impl std::fmt::Display) -> Response {
    error!("Record store unavailable: {err}");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Service temporarily unavailable, please retry.".to_string(),
    )
        .into_response()
}
