//! OTP challenge endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the bearer credential through the identity provider.
//! 2) Run the OTP operation for that subject.
//! 3) Map the outcome to a status code and `OtpResponse`.

use super::{OtpResponse, principal::require_auth, reply, store_unavailable};
use crate::{
    identity::IdentityProvider,
    otp::{BlockStatus, ChallengeOutcome, OtpService, ResendOutcome, SubmitOutcome},
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct VerifyRequest {
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/v1/otp/challenge",
    responses(
        (status = 202, description = "A live code exists (issued now or reused); remaining_seconds until it expires.", body = OtpResponse),
        (status = 401, description = "Missing or invalid credential."),
        (status = 404, description = "No pending registration.", body = OtpResponse),
        (status = 423, description = "Subject is blocked.", body = OtpResponse),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "otp"
)]
#[instrument(skip(headers, identity, service))]
pub async fn start_challenge(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match service.start_challenge(&principal.subject.subject_id).await {
        Ok(ChallengeOutcome::Issued { expires_in }) => reply(
            StatusCode::ACCEPTED,
            OtpResponse::status("issued").with_seconds(expires_in),
        ),
        Ok(ChallengeOutcome::Blocked { remaining_seconds }) => blocked(remaining_seconds),
        Ok(ChallengeOutcome::NotRegistered) => reply(
            StatusCode::NOT_FOUND,
            OtpResponse::status("not_registered"),
        ),
        Err(err) => store_unavailable(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/otp/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Code accepted; account promoted.", body = OtpResponse),
        (status = 400, description = "Missing payload or malformed code.", body = OtpResponse),
        (status = 401, description = "Missing or invalid credential."),
        (status = 410, description = "Code expired or no active challenge.", body = OtpResponse),
        (status = 422, description = "Wrong code; remaining_attempts before block.", body = OtpResponse),
        (status = 423, description = "Subject is blocked.", body = OtpResponse),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "otp"
)]
#[instrument(skip(headers, identity, service, payload))]
pub async fn verify(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<VerifyRequest>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return reply(StatusCode::BAD_REQUEST, OtpResponse::status("invalid_code"));
    };

    match service
        .submit_code(&principal.subject.subject_id, request.code.trim())
        .await
    {
        Ok(SubmitOutcome::Verified) => reply(StatusCode::OK, OtpResponse::status("verified")),
        Ok(SubmitOutcome::WrongCode { remaining_attempts }) => reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            OtpResponse::status("wrong_code").with_attempts(remaining_attempts),
        ),
        Ok(SubmitOutcome::Expired) => reply(StatusCode::GONE, OtpResponse::status("expired")),
        Ok(SubmitOutcome::Blocked { remaining_seconds }) => blocked(remaining_seconds),
        Ok(SubmitOutcome::InvalidCode) => {
            reply(StatusCode::BAD_REQUEST, OtpResponse::status("invalid_code"))
        }
        Err(err) => store_unavailable(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/otp/resend",
    responses(
        (status = 200, description = "New code issued; remaining_attempts is the resend budget left, the resend that would drop it below one blocks instead.", body = OtpResponse),
        (status = 401, description = "Missing or invalid credential."),
        (status = 410, description = "No active challenge; start over.", body = OtpResponse),
        (status = 423, description = "Subject is blocked.", body = OtpResponse),
        (status = 429, description = "Current code still valid; retry after remaining_seconds.", body = OtpResponse),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "otp"
)]
#[instrument(skip(headers, identity, service))]
pub async fn resend(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match service.request_resend(&principal.subject.subject_id).await {
        Ok(ResendOutcome::Resent {
            remaining_resends,
            expires_in,
        }) => reply(
            StatusCode::OK,
            OtpResponse::status("resent")
                .with_attempts(remaining_resends)
                .with_seconds(expires_in),
        ),
        Ok(ResendOutcome::Blocked { remaining_seconds }) => blocked(remaining_seconds),
        Ok(ResendOutcome::SessionExpired) => {
            reply(StatusCode::GONE, OtpResponse::status("session_expired"))
        }
        Ok(ResendOutcome::Cooldown { remaining_seconds }) => reply(
            StatusCode::TOO_MANY_REQUESTS,
            OtpResponse::status("cooldown").with_seconds(remaining_seconds),
        ),
        Err(err) => store_unavailable(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/otp/block-status",
    responses(
        (status = 200, description = "Current block state.", body = BlockStatus),
        (status = 401, description = "Missing or invalid credential."),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "otp"
)]
#[instrument(skip(headers, identity, service))]
pub async fn block_status(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match service.get_block_status(&principal.subject.subject_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => store_unavailable(&err),
    }
}

fn blocked(remaining_seconds: u64) -> Response {
    reply(
        StatusCode::LOCKED,
        OtpResponse::status("blocked").with_seconds(remaining_seconds),
    )
}
