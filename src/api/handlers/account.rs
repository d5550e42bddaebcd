//! Session-level endpoints: where a signed-in subject belongs, and sign-out.

use super::{
    principal::{extract_bearer_token, require_auth},
    store_unavailable,
};
use crate::{
    identity::IdentityProvider,
    otp::{AccountState, OtpService},
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug)]
pub struct AccountStateResponse {
    pub subject_id: String,
    pub state: AccountState,
}

#[utoipa::path(
    get,
    path = "/v1/account/state",
    responses(
        (status = 200, description = "Account state of the authenticated subject.", body = AccountStateResponse),
        (status = 401, description = "Missing or invalid credential."),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "account"
)]
#[instrument(skip(headers, identity, service))]
pub async fn account_state(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match service.account_state(&principal.subject.subject_id).await {
        Ok(state) => (
            StatusCode::OK,
            Json(AccountStateResponse {
                subject_id: principal.subject.subject_id,
                state,
            }),
        )
            .into_response(),
        Err(err) => store_unavailable(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-out",
    responses(
        (status = 204, description = "Session ended."),
        (status = 401, description = "Missing credential."),
        (status = 503, description = "Identity provider unavailable, retry."),
    ),
    tag = "account"
)]
#[instrument(skip(headers, identity))]
pub async fn sign_out(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
) -> Response {
    let Some(token) = extract_bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match identity.sign_out(&token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to sign out: {err}");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
