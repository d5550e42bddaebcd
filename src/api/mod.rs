//! HTTP surface: documented routes plus the middleware every request passes.

use crate::{identity::IdentityProvider, otp::OtpService};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::options,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

const REQUEST_ID: &str = "x-request-id";

/// Documented routes only, still carrying their `OpenAPI` metadata.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// The served application.
///
/// Requests get an `x-request-id` (a ULID unless the caller sent one), which is
/// echoed on the response and recorded on the request span. CORS admits only
/// the frontend origin.
///
/// # Errors
/// Returns an error if `frontend_base_url` is not a usable origin.
pub fn app(
    service: Arc<OtpService>,
    identity: Arc<dyn IdentityProvider>,
    frontend_base_url: &str,
) -> Result<Router> {
    let cors = cors(frontend_origin(frontend_base_url)?);
    let (routes, _) = router().split_for_parts();

    let middleware = ServiceBuilder::new()
        .layer(SetRequestHeaderLayer::if_not_present(request_id(), |_: &_| {
            HeaderValue::from_str(&Ulid::new().to_string()).ok()
        }))
        .layer(PropagateRequestIdLayer::new(request_id()))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(cors)
        .layer(Extension(identity))
        .layer(Extension(service));

    Ok(routes
        .route("/health", options(handlers::health::health))
        .layer(middleware))
}

/// Serve on `[::]:port` until ctrl-c.
///
/// # Errors
/// Binding or serving failed.
pub async fn new(
    port: u16,
    service: Arc<OtpService>,
    identity: Arc<dyn IdentityProvider>,
    frontend_base_url: &str,
) -> Result<()> {
    let app = app(service, identity, frontend_base_url)?;
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{port}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn request_id() -> HeaderName {
    HeaderName::from_static(REQUEST_ID)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(err) => error!("Failed to listen for shutdown signal: {err}"),
    }
}

fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

fn make_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = route,
        request_id
    )
}

/// Scheme, host and port of the frontend URL, as browsers send it in `Origin`.
fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let url = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Frontend base URL has no host: {frontend_base_url}"))?;
    let origin = match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    };
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_drops_path() -> Result<()> {
        let origin = frontend_origin("https://app.example.com:8443/signup?x=1")?;
        assert_eq!(origin, "https://app.example.com:8443");

        let origin = frontend_origin("http://localhost:5173/")?;
        assert_eq!(origin, "http://localhost:5173");
        Ok(())
    }

    #[test]
    fn frontend_origin_requires_host() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:team@otpgate.dev").is_err());
    }
}
