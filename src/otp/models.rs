//! Stored record shapes.
//!
//! Field names match the stored documents (`camelCase`), so records written by
//! other clients of the same collections stay readable.

use crate::store::{Fields, StoreError};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use utoipa::ToSchema;

pub(crate) const FIELD_BLOCKED: &str = "blocked";
pub(crate) const FIELD_BLOCKED_UNTIL: &str = "blockedUntil";
pub(crate) const FIELD_VERIFIED_AT: &str = "verifiedAt";
pub(crate) const FIELD_OTP: &str = "otp";
pub(crate) const FIELD_EXPIRES_AT: &str = "expiresAt";
pub(crate) const FIELD_ATTEMPTS: &str = "attempts";
pub(crate) const FIELD_ATTEMPTS_RESEND: &str = "attemptsResend";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }
}

/// `tempUsers/{subjectId}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
    pub phone_number: String,
    pub address: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub fee: String,
    pub role: Role,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub blocked_until: Option<i64>,
    pub created_at: i64,
}

/// `otp_verifications/{subjectId}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    pub otp: String,
    pub expires_at: i64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub attempts_resend: u32,
}

/// Block fields of a pending registration; tolerant of partially written records.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockFields {
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub blocked_until: Option<i64>,
}

pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Unavailable(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(err) => Err(StoreError::Unavailable(err.to_string())),
    }
}

/// Decode a stored record. A malformed record is reported as a store fault.
pub(crate) fn from_fields<T: DeserializeOwned>(fields: &Fields) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|err| StoreError::Unavailable(format!("malformed record: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending() -> PendingRegistration {
        PendingRegistration {
            subject_id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada L.".to_string(),
            phone_number: "+15551234567".to_string(),
            address: "1 Main St".to_string(),
            degree: "MBBS".to_string(),
            fee: "50".to_string(),
            role: Role::Doctor,
            blocked: false,
            blocked_until: None,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn pending_registration_uses_stored_field_names() -> anyhow::Result<()> {
        let fields = to_fields(&pending())?;
        for key in [
            "subjectId",
            "email",
            "displayName",
            "phoneNumber",
            "address",
            "degree",
            "fee",
            "role",
            "blocked",
            "blockedUntil",
            "createdAt",
        ] {
            assert!(fields.contains_key(key), "missing {key}");
        }
        assert_eq!(fields.get("role"), Some(&json!("doctor")));
        assert_eq!(fields.get("blockedUntil"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn challenge_counters_default_to_zero() -> anyhow::Result<()> {
        let mut fields = Fields::new();
        fields.insert(FIELD_OTP.to_string(), json!("123456"));
        fields.insert(FIELD_EXPIRES_AT.to_string(), json!(60_000));
        let challenge: OtpChallenge = from_fields(&fields)?;
        assert_eq!(challenge.attempts, 0);
        assert_eq!(challenge.attempts_resend, 0);
        Ok(())
    }

    #[test]
    fn malformed_record_is_a_store_fault() {
        let mut fields = Fields::new();
        fields.insert(FIELD_OTP.to_string(), json!(123_456));
        let result: Result<OtpChallenge, _> = from_fields(&fields);
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn block_fields_tolerate_missing_keys() -> anyhow::Result<()> {
        let block: BlockFields = from_fields(&Fields::new())?;
        assert_eq!(block, BlockFields::default());
        Ok(())
    }
}
