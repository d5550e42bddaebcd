use super::{OtpResponse, principal::require_auth, reply, store_unavailable};
use crate::{
    identity::IdentityProvider,
    otp::{OtpService, RegistrationError, RegistrationRequest},
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/v1/registration",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Registration staged; verify with an OTP next.", body = OtpResponse),
        (status = 400, description = "Missing payload or invalid field."),
        (status = 401, description = "Missing or invalid credential."),
        (status = 409, description = "Subject already registered.", body = OtpResponse),
        (status = 503, description = "Dependency unavailable, retry."),
    ),
    tag = "registration"
)]
#[instrument(skip(headers, identity, service, payload))]
pub async fn register(
    headers: HeaderMap,
    identity: Extension<Arc<dyn IdentityProvider>>,
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<RegistrationRequest>>,
) -> Response {
    let principal = match require_auth(&headers, identity.0.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match service.register(&principal.subject, request).await {
        Ok(_) => reply(
            StatusCode::CREATED,
            OtpResponse::status("pending_verification"),
        ),
        Err(RegistrationError::AlreadyRegistered) => reply(
            StatusCode::CONFLICT,
            OtpResponse::status("already_registered"),
        ),
        Err(err @ RegistrationError::StoreUnavailable(_)) => store_unavailable(&err),
        Err(err) => {
            debug!("Rejected registration: {err}");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}
