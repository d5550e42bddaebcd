//! Registration staging.
//!
//! A validated registration lands in `tempUsers/{subjectId}` and stays there
//! until the OTP step promotes it.

use super::models::{PendingRegistration, Role, to_fields};
use crate::{
    identity::Subject,
    store::{PENDING_REGISTRATIONS, RecordStore, SetMode, StoreError, USERS},
};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(ToSchema, Deserialize, Debug, Clone)]
pub struct RegistrationRequest {
    pub name: String,
    /// Defaults to the email known to the identity provider.
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    pub role: Role,
    /// Required for doctors.
    #[serde(default)]
    pub degree: Option<String>,
    /// Consultation fee, required for doctors.
    #[serde(default)]
    pub fee: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("name must contain only letters, spaces and dots, and start and end with a letter")]
    InvalidName,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("address is required")]
    MissingAddress,
    #[error("degree is required for doctors")]
    MissingDegree,
    #[error("consultation fee must be a positive number")]
    InvalidFee,
    #[error("subject is already registered")]
    AlreadyRegistered,
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Validate `request` and stage it as the subject's pending registration.
///
/// # Errors
/// A validation variant, `AlreadyRegistered` when a pending or permanent
/// record exists, or `StoreUnavailable`.
#[instrument(skip(store, subject, request), fields(subject_id = %subject.subject_id))]
pub async fn stage(
    store: &dyn RecordStore,
    subject: &Subject,
    request: RegistrationRequest,
    now: i64,
) -> Result<PendingRegistration, RegistrationError> {
    let pending = validate(subject, request, now)?;

    if store.get(USERS, &subject.subject_id).await?.is_some()
        || store
            .get(PENDING_REGISTRATIONS, &subject.subject_id)
            .await?
            .is_some()
    {
        return Err(RegistrationError::AlreadyRegistered);
    }

    store
        .set(
            PENDING_REGISTRATIONS,
            &subject.subject_id,
            to_fields(&pending)?,
            SetMode::Overwrite,
        )
        .await?;

    info!(role = pending.role.as_str(), "Registration staged");
    Ok(pending)
}

fn validate(
    subject: &Subject,
    request: RegistrationRequest,
    now: i64,
) -> Result<PendingRegistration, RegistrationError> {
    let display_name = request.name.trim().to_string();
    if !valid_name(&display_name) {
        return Err(RegistrationError::InvalidName);
    }

    let email = request
        .email
        .or_else(|| subject.email.clone())
        .map(|email| normalize_email(&email))
        .unwrap_or_default();
    if !valid_email(&email) {
        return Err(RegistrationError::InvalidEmail);
    }

    let phone_number = normalize_phone(&request.phone).ok_or(RegistrationError::InvalidPhone)?;

    let address = request.address.trim().to_string();
    if address.is_empty() {
        return Err(RegistrationError::MissingAddress);
    }

    let (degree, fee) = match request.role {
        Role::Patient => (String::new(), String::new()),
        Role::Doctor => {
            let degree = request.degree.unwrap_or_default().trim().to_string();
            if degree.is_empty() {
                return Err(RegistrationError::MissingDegree);
            }
            let fee = request.fee.unwrap_or_default().trim().to_string();
            if !valid_fee(&fee) {
                return Err(RegistrationError::InvalidFee);
            }
            (degree, fee)
        }
    };

    Ok(PendingRegistration {
        subject_id: subject.subject_id.clone(),
        email,
        display_name,
        phone_number,
        address,
        degree,
        fee,
        role: request.role,
        blocked: false,
        blocked_until: None,
        created_at: now,
    })
}

fn valid_name(name: &str) -> bool {
    Regex::new(r"^[A-Za-z](?:[A-Za-z\s.]*[A-Za-z])?$").is_ok_and(|regex| regex.is_match(name))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// `+<digits>` with separators dropped, or `None` when it cannot be a phone number.
fn normalize_phone(phone: &str) -> Option<String> {
    let compact: String = phone
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some(format!("+{digits}"))
}

fn valid_fee(fee: &str) -> bool {
    fee.parse::<f64>()
        .is_ok_and(|amount| amount.is_finite() && amount > 0.0)
}
