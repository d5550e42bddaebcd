//! HTTP surface tests.
//!
//! Drives the full router (layers included) with `tower::ServiceExt::oneshot`
//! against an in-memory store and a stub identity provider.

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use otpgate::{
    identity::{IdentityError, IdentityFuture, IdentityProvider, Subject},
    otp::{LogOtpSender, ManualClock, OtpConfig, OtpService, SystemClock},
    store::{Fields, MemoryStore, OTP_CHALLENGES, RecordStore},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const FRONTEND: &str = "http://localhost:5173";
const GOOD: &str = "good";
const DOWN: &str = "down";
const SUBJECT: &str = "subject-1";

struct StubIdentity;

impl IdentityProvider for StubIdentity {
    fn current_subject<'a>(
        &'a self,
        token: &'a SecretString,
    ) -> IdentityFuture<'a, Option<Subject>> {
        Box::pin(async move {
            match token.expose_secret() {
                GOOD => Ok(Some(Subject {
                    subject_id: SUBJECT.to_string(),
                    email: Some("ada@example.com".to_string()),
                    display_name: Some("Ada".to_string()),
                })),
                DOWN => Err(IdentityError::Unavailable("connection refused".to_string())),
                _ => Ok(None),
            }
        })
    }

    fn sign_out<'a>(&'a self, token: &'a SecretString) -> IdentityFuture<'a, ()> {
        Box::pin(async move {
            if token.expose_secret() == DOWN {
                Err(IdentityError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

fn app_with(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> Result<Router> {
    let service = Arc::new(OtpService::new(
        store,
        clock,
        Arc::new(LogOtpSender),
        OtpConfig::new(),
    ));
    otpgate::api::app(service, Arc::new(StubIdentity), FRONTEND)
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    Ok(request)
}

async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(request).await?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn registration() -> Value {
    json!({
        "name": "Ada Lovelace",
        "phone": "+44 20 7123 4567",
        "address": "12 St James's Square",
        "role": "patient"
    })
}

async fn force_code(store: &MemoryStore, code: &str) -> Result<()> {
    let mut fields = Fields::new();
    fields.insert("otp".to_string(), json!(code));
    store.update(OTP_CHALLENGES, SUBJECT, fields, None).await?;
    Ok(())
}

#[tokio::test]
async fn missing_or_unknown_credential_is_unauthorized() -> Result<()> {
    let app = app_with(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)))?;

    for uri in ["/v1/otp/challenge", "/v1/otp/resend", "/v1/registration"] {
        let response = send(&app, request(Method::POST, uri, None, None)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let response = send(&app, request(Method::POST, uri, Some("stale"), None)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = send(&app, request(Method::GET, "/v1/otp/block-status", None, None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn identity_outage_is_service_unavailable() -> Result<()> {
    let app = app_with(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)))?;

    let response = send(&app, request(Method::POST, "/v1/otp/challenge", Some(DOWN), None)?).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(&app, request(Method::POST, "/v1/auth/sign-out", Some(DOWN), None)?).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn registration_then_verification() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let app = app_with(store.clone(), clock.clone())?;

    let response = send(&app, request(Method::GET, "/v1/account/state", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["state"], json!("unregistered"));

    let response = send(&app, request(Method::POST, "/v1/otp/challenge", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        request(Method::POST, "/v1/registration", Some(GOOD), Some(registration()))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await?["status"], json!("pending_verification"));

    let response = send(
        &app,
        request(Method::POST, "/v1/registration", Some(GOOD), Some(registration()))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, request(Method::POST, "/v1/otp/challenge", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        json_body(response).await?,
        json!({"status": "issued", "remaining_seconds": 60})
    );

    force_code(&store, "482913").await?;

    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "12ab"})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "000000"})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json_body(response).await?,
        json!({"status": "wrong_code", "remaining_attempts": 2})
    );

    let response = send(&app, request(Method::POST, "/v1/otp/resend", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await?["remaining_seconds"], json!(60));

    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "482913"})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["status"], json!("verified"));

    let response = send(&app, request(Method::GET, "/v1/account/state", Some(GOOD), None)?).await?;
    assert_eq!(
        json_body(response).await?,
        json!({"subject_id": SUBJECT, "state": "active"})
    );

    let response = send(&app, request(Method::POST, "/v1/auth/sign-out", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn invalid_registration_is_rejected() -> Result<()> {
    let app = app_with(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)))?;

    let mut payload = registration();
    payload["name"] = json!("R2-D2");
    let response = send(
        &app,
        request(Method::POST, "/v1/registration", Some(GOOD), Some(payload))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut payload = registration();
    payload["role"] = json!("doctor");
    let response = send(
        &app,
        request(Method::POST, "/v1/registration", Some(GOOD), Some(payload))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, request(Method::POST, "/v1/registration", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn lockout_and_expiry_statuses() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let app = app_with(store.clone(), clock.clone())?;

    send(
        &app,
        request(Method::POST, "/v1/registration", Some(GOOD), Some(registration()))?,
    )
    .await?;
    send(&app, request(Method::POST, "/v1/otp/challenge", Some(GOOD), None)?).await?;
    force_code(&store, "482913").await?;

    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "999999"})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    clock.advance_seconds(61);
    let code = store
        .get(OTP_CHALLENGES, SUBJECT)
        .await?
        .and_then(|record| record.fields.get("otp").cloned())
        .context("challenge exists")?;
    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": code})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::GONE);

    let response = send(&app, request(Method::POST, "/v1/otp/resend", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await?,
        json!({"status": "resent", "remaining_attempts": 2, "remaining_seconds": 60})
    );

    force_code(&store, "482913").await?;
    for expected in [StatusCode::UNPROCESSABLE_ENTITY, StatusCode::UNPROCESSABLE_ENTITY] {
        let response = send(
            &app,
            request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "000000"})))?,
        )
        .await?;
        assert_eq!(response.status(), expected);
    }
    let response = send(
        &app,
        request(Method::POST, "/v1/otp/verify", Some(GOOD), Some(json!({"code": "000000"})))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::LOCKED);
    assert_eq!(
        json_body(response).await?,
        json!({"status": "blocked", "remaining_seconds": 300})
    );

    let response = send(&app, request(Method::GET, "/v1/otp/block-status", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await?,
        json!({"blocked": true, "remaining_seconds": 300})
    );

    let response = send(&app, request(Method::POST, "/v1/otp/resend", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::LOCKED);

    clock.advance_seconds(301);
    let response = send(&app, request(Method::GET, "/v1/otp/block-status", Some(GOOD), None)?).await?;
    assert_eq!(
        json_body(response).await?,
        json!({"blocked": false, "remaining_seconds": 0})
    );

    let response = send(&app, request(Method::POST, "/v1/otp/resend", Some(GOOD), None)?).await?;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(json_body(response).await?["status"], json!("session_expired"));
    Ok(())
}

#[tokio::test]
async fn health_reflects_store() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(OtpService::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(LogOtpSender),
        OtpConfig::new(),
    ));
    let app = otpgate::api::app(service, Arc::new(StubIdentity), FRONTEND)?;

    let response = send(&app, request(Method::GET, "/health", None, None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("X-App"));
    let body = json_body(response).await?;
    assert_eq!(body["name"], json!("otpgate"));
    assert_eq!(body["store"], json!("ok"));

    let response = send(&app, request(Method::OPTIONS, "/health", None, None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    store.set_unavailable(true);
    let response = send(&app, request(Method::GET, "/health", None, None)?).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await?["store"], json!("error"));
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = app_with(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)))?;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = send(&app, request).await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}
