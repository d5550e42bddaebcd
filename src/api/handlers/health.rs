use crate::{GIT_COMMIT_HASH, otp::OtpService};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    /// `ok` or `error`, depending on whether the record store answered.
    store: String,
}

impl Health {
    fn current(store_ok: bool) -> Self {
        Self {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: if store_ok { "ok" } else { "error" }.to_string(),
        }
    }

    /// `name:version:shortsha` for the `X-App` header.
    fn app_header(&self) -> Option<HeaderValue> {
        let short_sha = self.commit.get(..7).unwrap_or(&self.commit);
        HeaderValue::from_str(&format!("{}:{}:{short_sha}", self.name, self.version))
            .map_err(|err| error!("Failed to build X-App header: {err}"))
            .ok()
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Record store is reachable", body = Health),
        (status = 503, description = "Record store is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(method: Method, service: Extension<Arc<OtpService>>) -> Response {
    let store_ok = match service.ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("Record store ping failed: {err}");
            false
        }
    };

    let health = Health::current(store_ok);
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut headers = HeaderMap::new();
    if let Some(value) = health.app_header() {
        headers.insert("X-App", value);
    }

    // OPTIONS is a liveness check, no body.
    if method == Method::GET {
        (status, headers, Json(health)).into_response()
    } else {
        (status, headers).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_header_shortens_commit() {
        let mut health = Health::current(true);
        health.commit = "0123456789abcdef".to_string();
        let header = health.app_header();
        assert_eq!(
            header.as_ref().and_then(|value| value.to_str().ok()),
            Some(format!("otpgate:{}:0123456", env!("CARGO_PKG_VERSION")).as_str())
        );
    }

    #[test]
    fn store_state_is_reported() {
        assert_eq!(Health::current(true).store, "ok");
        assert_eq!(Health::current(false).store, "error");
    }
}
