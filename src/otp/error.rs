//! Error taxonomy and caller-facing outcomes.

use crate::store::StoreError;
use serde::Serialize;
use utoipa::ToSchema;

/// Everything an OTP operation can run into.
///
/// Only [`OtpError::StoreUnavailable`] escapes [`super::OtpService`]; the rest
/// are folded into the structured outcomes below.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("no authenticated subject")]
    NotAuthenticated,
    #[error("no pending registration")]
    NotRegistered,
    #[error("subject is blocked for another {remaining_seconds}s")]
    AlreadyBlocked { remaining_seconds: u64 },
    #[error("no active challenge")]
    NoChallenge,
    #[error("code expired")]
    Expired,
    #[error("code mismatch, {remaining_attempts} attempts left")]
    Mismatch { remaining_attempts: u32 },
    #[error("attempts exhausted")]
    Exhausted,
    #[error("resend available in {remaining_seconds}s")]
    Cooldown { remaining_seconds: u64 },
    #[error("code must be numeric with the configured length")]
    InvalidCode,
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for OtpError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Issued { expires_in: u64 },
    Blocked { remaining_seconds: u64 },
    NotRegistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Verified,
    WrongCode { remaining_attempts: u32 },
    Expired,
    Blocked { remaining_seconds: u64 },
    InvalidCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    /// New code issued; `remaining_resends` is the resend budget left, counted
    /// like `WrongCode::remaining_attempts`.
    Resent { remaining_resends: u32, expires_in: u64 },
    Blocked { remaining_seconds: u64 },
    SessionExpired,
    Cooldown { remaining_seconds: u64 },
}

#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    pub remaining_seconds: u64,
}

impl BlockStatus {
    pub(crate) const CLEAR: Self = Self {
        blocked: false,
        remaining_seconds: 0,
    };
}

#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Active,
    PendingVerification,
    Unregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted,
    NothingToPromote,
}
