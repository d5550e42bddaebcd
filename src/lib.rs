//! # Otpgate (OTP verification & account provisioning)
//!
//! `otpgate` sits between an external identity provider and the account store of
//! a patient/doctor consultation app. A subject that signed in with the identity
//! provider registers, proves control of the account with a one-time password,
//! and only then becomes a permanent user.
//!
//! ## Records
//!
//! State lives in three collections of a document-style [`store::RecordStore`]:
//!
//! - `tempUsers/{subjectId}`: the pending registration, including the block
//!   fields (`blocked`, `blockedUntil`).
//! - `otp_verifications/{subjectId}`: the single live challenge (`otp`,
//!   `expiresAt`, `attempts`, `attemptsResend`).
//! - `users/{subjectId}`: the promoted account, stamped with `verifiedAt`.
//!
//! ## Lockout
//!
//! Too many wrong codes, or too many resends, delete the challenge and block
//! the subject for a fixed window. The block is kept on the pending
//! registration so requesting a new code cannot shed it, and it lifts lazily on
//! the first check after `blockedUntil`.
//!
//! ## Concurrency
//!
//! Operations for one subject are serialised in-process by a keyed mutex and
//! across processes by compare-and-swap on the record version.

pub mod api;
pub mod cli;
pub mod identity;
pub mod otp;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_crate() {
        assert!(APP_USER_AGENT.starts_with("otpgate/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}
