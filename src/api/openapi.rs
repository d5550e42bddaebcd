use super::handlers::{account, health, otp, registration};
use utoipa::openapi::{
    InfoBuilder, OpenApi, OpenApiBuilder,
    info::{ContactBuilder, LicenseBuilder},
    tag::{Tag, TagBuilder},
};
use utoipa_axum::{router::OpenApiRouter, routes};

/// The generated `OpenAPI` document, without serving anything.
#[must_use]
pub fn openapi() -> OpenApi {
    api_router().split_for_parts().1
}

/// Every documented route. `OPTIONS /health` is mounted in [`super::app`]
/// and does not show up here.
pub(crate) fn api_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(document())
        .routes(routes!(health::health))
        .routes(routes!(registration::register))
        .routes(routes!(account::account_state))
        .routes(routes!(account::sign_out))
        .routes(routes!(otp::start_challenge))
        .routes(routes!(otp::verify))
        .routes(routes!(otp::resend))
        .routes(routes!(otp::block_status))
}

fn document() -> OpenApi {
    let (name, email) = primary_author(env!("CARGO_PKG_AUTHORS"));
    let contact = (name.is_some() || email.is_some())
        .then(|| ContactBuilder::new().name(name).email(email).build());
    let license = non_empty(env!("CARGO_PKG_LICENSE")).map(|spdx| {
        LicenseBuilder::new()
            .name(spdx)
            .identifier(Some(spdx))
            .build()
    });

    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(non_empty(env!("CARGO_PKG_DESCRIPTION")))
        .contact(contact)
        .license(license)
        .build();

    OpenApiBuilder::new().info(info).tags(Some(tags())).build()
}

fn tags() -> Vec<Tag> {
    [
        ("registration", "Stage a pending registration"),
        ("otp", "One-time password challenge, verification and resend"),
        ("account", "Account state and sign-out"),
        ("health", "Service health"),
    ]
    .into_iter()
    .map(|(name, description)| {
        TagBuilder::new()
            .name(name)
            .description(Some(description))
            .build()
    })
    .collect()
}

/// First entry of `CARGO_PKG_AUTHORS` (colon separated), split into
/// `Name <email>` parts.
fn primary_author(authors: &str) -> (Option<&str>, Option<&str>) {
    let primary = authors.split(':').next().unwrap_or_default().trim();
    match primary.split_once('<') {
        Some((name, rest)) => (
            non_empty(name),
            non_empty(rest.trim_end_matches('>')),
        ),
        None => (non_empty(primary), None),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_info_comes_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some("OTP verification and account provisioning")
        );

        let contact = spec.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Team Otpgate"));
        assert_eq!(contact.email.as_deref(), Some("team@otpgate.dev"));

        assert_eq!(
            spec.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
    }

    #[test]
    fn every_route_is_documented() {
        let spec = openapi();
        for path in [
            "/health",
            "/v1/registration",
            "/v1/account/state",
            "/v1/auth/sign-out",
            "/v1/otp/challenge",
            "/v1/otp/verify",
            "/v1/otp/resend",
            "/v1/otp/block-status",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn primary_author_parts() {
        assert_eq!(
            primary_author("Team Otpgate <team@otpgate.dev>:Someone Else"),
            (Some("Team Otpgate"), Some("team@otpgate.dev"))
        );
        assert_eq!(primary_author("Solo"), (Some("Solo"), None));
        assert_eq!(primary_author("<only@mail.dev>"), (None, Some("only@mail.dev")));
        assert_eq!(primary_author(""), (None, None));
    }
}
