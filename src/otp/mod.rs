//! OTP verification and account provisioning.
//!
//! Flow per subject:
//! 1. [`OtpService::register`] stages a pending registration (`tempUsers`).
//! 2. [`OtpService::start_challenge`] issues a numeric code (`otp_verifications`).
//! 3. [`OtpService::submit_code`] checks it; a match promotes the pending
//!    registration to `users`, too many misses block the subject.
//! 4. [`OtpService::request_resend`] replaces an expired code; too many
//!    resends block the subject as well.
//!
//! Blocks live on the pending registration and lift on their own once
//! `blockedUntil` has passed. All gating is derived from stored timestamps, so
//! nothing here depends on client-side timers.

pub mod block;
pub mod challenge;
pub mod clock;
pub mod code;
pub mod config;
pub mod error;
pub mod locks;
pub mod models;
pub mod promotion;
pub mod registration;
pub mod sender;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OtpConfig;
pub use error::{
    AccountState, BlockStatus, ChallengeOutcome, OtpError, PromotionOutcome, ResendOutcome,
    SubmitOutcome,
};
pub use models::{OtpChallenge, PendingRegistration, Role};
pub use registration::{RegistrationError, RegistrationRequest};
pub use sender::{LogOtpSender, OtpDelivery, OtpSender};
pub use service::OtpService;

/// Reads retried when a compare-and-swap loses to another writer.
const CAS_ATTEMPTS: usize = 3;

fn contention(collection: &str, id: &str) -> OtpError {
    tracing::error!(collection, id, "Giving up after repeated version conflicts");
    OtpError::StoreUnavailable(format!("persistent contention on {collection}/{id}"))
}
