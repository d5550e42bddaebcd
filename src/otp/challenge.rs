//! OTP challenge engine.
//!
//! One challenge document per subject in `otp_verifications`. Generate creates
//! it when missing and resend replaces an expired code; a successful
//! verification or a block deletes it. A live code is never replaced, so the
//! attempt budget cannot be reset by asking again.
//! Every counter change is a compare-and-swap on the record version, retried
//! from a fresh read when another writer got there first.

use super::{
    CAS_ATTEMPTS,
    block::{block, check_blocked},
    clock::{Clock, remaining_seconds},
    code::{codes_match, generate_code, is_well_formed},
    config::OtpConfig,
    contention,
    error::{OtpError, PromotionOutcome},
    models::{
        FIELD_ATTEMPTS, FIELD_ATTEMPTS_RESEND, FIELD_EXPIRES_AT, FIELD_OTP, OtpChallenge,
        PendingRegistration, from_fields,
    },
    promotion::promote,
    sender::{OtpDelivery, OtpSender},
};
use crate::store::{
    Fields, OTP_CHALLENGES, PENDING_REGISTRATIONS, RecordStore, SetMode, StoreError,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Code issued by [`ChallengeEngine::generate`] or [`ChallengeEngine::resend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issued {
    pub expires_at: i64,
    /// Resend budget left; the resend that would take it below one blocks the
    /// subject instead, the same way `remaining_attempts` counts down.
    pub remaining_resends: u32,
}

pub struct ChallengeEngine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    sender: Arc<dyn OtpSender>,
    config: OtpConfig,
}

impl ChallengeEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn OtpSender>,
        config: OtpConfig,
    ) -> Self {
        Self {
            store,
            clock,
            sender,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Make sure the subject has a live code, issuing one only when needed.
    ///
    /// Safe to call on every page load: while the stored code is unexpired it
    /// is reused as is (no write, no second delivery, attempts untouched).
    /// Without a challenge a fresh code is merge-written with `attempts = 0`.
    /// An expired code is replaced through [`Self::resend`], so it counts
    /// against the resend budget.
    ///
    /// # Errors
    /// `AlreadyBlocked`, `NotRegistered`, `Exhausted` (the replacement hit the
    /// resend limit) or `StoreUnavailable`.
    #[instrument(skip(self))]
    pub async fn generate(&self, subject_id: &str) -> Result<Issued, OtpError> {
        let now = self.now();
        let status = check_blocked(self.store(), subject_id, now).await?;
        if status.blocked {
            return Err(OtpError::AlreadyBlocked {
                remaining_seconds: status.remaining_seconds,
            });
        }

        let Some(pending) = self.store.get(PENDING_REGISTRATIONS, subject_id).await? else {
            return Err(OtpError::NotRegistered);
        };
        let pending: PendingRegistration = from_fields(&pending.fields)?;

        if let Some(record) = self.store.get(OTP_CHALLENGES, subject_id).await? {
            let challenge: OtpChallenge = from_fields(&record.fields)?;
            if now < challenge.expires_at {
                debug!(expires_at = challenge.expires_at, "Reusing live challenge");
                return Ok(self.live(&challenge));
            }
            return match self.resend(subject_id).await {
                // Replaced by another writer in the meantime.
                Err(OtpError::Cooldown { .. }) => self.current(subject_id).await,
                other => other,
            };
        }

        let code = generate_code(self.config.otp_length());
        let expires_at = now.saturating_add(self.config.otp_expiry_millis());

        let mut fields = Fields::new();
        fields.insert(FIELD_OTP.to_string(), json!(code));
        fields.insert(FIELD_EXPIRES_AT.to_string(), json!(expires_at));
        fields.insert(FIELD_ATTEMPTS.to_string(), json!(0));
        self.store
            .set(OTP_CHALLENGES, subject_id, fields, SetMode::Merge)
            .await?;

        let resends = match self.store.get(OTP_CHALLENGES, subject_id).await? {
            Some(record) => from_fields::<OtpChallenge>(&record.fields)?.attempts_resend,
            None => 0,
        };

        info!(expires_at, "Challenge issued");
        self.deliver(subject_id, Some(pending.email), code, expires_at);

        Ok(Issued {
            expires_at,
            remaining_resends: self.remaining_resends(resends),
        })
    }

    fn live(&self, challenge: &OtpChallenge) -> Issued {
        Issued {
            expires_at: challenge.expires_at,
            remaining_resends: self.remaining_resends(challenge.attempts_resend),
        }
    }

    async fn current(&self, subject_id: &str) -> Result<Issued, OtpError> {
        match self.store.get(OTP_CHALLENGES, subject_id).await? {
            Some(record) => Ok(self.live(&from_fields(&record.fields)?)),
            None => Err(contention(OTP_CHALLENGES, subject_id)),
        }
    }

    fn remaining_resends(&self, resends: u32) -> u32 {
        self.config.max_attempts_resend().saturating_sub(resends)
    }

    /// Check `candidate` against the live code; promote the account on a match.
    ///
    /// # Errors
    /// `InvalidCode`, `AlreadyBlocked`, `NoChallenge`, `Expired`, `Mismatch`,
    /// `Exhausted` (the subject is now blocked) or `StoreUnavailable`.
    #[instrument(skip(self, candidate))]
    pub async fn verify(&self, subject_id: &str, candidate: &str) -> Result<(), OtpError> {
        if !is_well_formed(candidate, self.config.otp_length()) {
            return Err(OtpError::InvalidCode);
        }

        let now = self.now();
        let status = check_blocked(self.store(), subject_id, now).await?;
        if status.blocked {
            return Err(OtpError::AlreadyBlocked {
                remaining_seconds: status.remaining_seconds,
            });
        }

        for _ in 0..CAS_ATTEMPTS {
            let Some(record) = self.store.get(OTP_CHALLENGES, subject_id).await? else {
                return Err(OtpError::NoChallenge);
            };
            let challenge: OtpChallenge = from_fields(&record.fields)?;

            if now >= challenge.expires_at {
                return Err(OtpError::Expired);
            }

            if codes_match(&challenge.otp, candidate) {
                // Promote before consuming the code, so a failed promotion can
                // be retried with the same code.
                if promote(self.store(), subject_id, now).await?
                    == PromotionOutcome::NothingToPromote
                {
                    warn!("Verified a challenge without a pending registration");
                }
                self.store.delete(OTP_CHALLENGES, subject_id, None).await?;
                info!("Challenge verified");
                return Ok(());
            }

            let attempts = challenge.attempts.saturating_add(1);
            if attempts >= self.config.max_attempts() {
                block(self.store(), subject_id, now, &self.config).await?;
                return Err(OtpError::Exhausted);
            }

            let mut fields = Fields::new();
            fields.insert(FIELD_ATTEMPTS.to_string(), json!(attempts));
            match self
                .store
                .update(OTP_CHALLENGES, subject_id, fields, Some(record.version))
                .await
            {
                Ok(_) => {
                    let remaining_attempts = self.config.max_attempts() - attempts;
                    info!(remaining_attempts, "Code mismatch");
                    return Err(OtpError::Mismatch { remaining_attempts });
                }
                Err(StoreError::NotFound { .. }) => continue,
                Err(err) if err.is_conflict() => {
                    debug!("Challenge changed while counting attempt, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(contention(OTP_CHALLENGES, subject_id))
    }

    /// Replace the live code once its cooldown has passed.
    ///
    /// # Errors
    /// `AlreadyBlocked`, `NoChallenge` (nothing is created), `Cooldown`,
    /// `Exhausted` (the subject is now blocked) or `StoreUnavailable`.
    #[instrument(skip(self))]
    pub async fn resend(&self, subject_id: &str) -> Result<Issued, OtpError> {
        let now = self.now();
        let status = check_blocked(self.store(), subject_id, now).await?;
        if status.blocked {
            return Err(OtpError::AlreadyBlocked {
                remaining_seconds: status.remaining_seconds,
            });
        }

        for _ in 0..CAS_ATTEMPTS {
            let Some(record) = self.store.get(OTP_CHALLENGES, subject_id).await? else {
                return Err(OtpError::NoChallenge);
            };
            let challenge: OtpChallenge = from_fields(&record.fields)?;

            if now < challenge.expires_at {
                return Err(OtpError::Cooldown {
                    remaining_seconds: remaining_seconds(challenge.expires_at, now),
                });
            }

            let resends = challenge.attempts_resend.saturating_add(1);
            if resends >= self.config.max_attempts_resend() {
                block(self.store(), subject_id, now, &self.config).await?;
                return Err(OtpError::Exhausted);
            }

            let code = generate_code(self.config.otp_length());
            let expires_at = now.saturating_add(self.config.otp_expiry_millis());

            let mut fields = Fields::new();
            fields.insert(FIELD_OTP.to_string(), json!(code));
            fields.insert(FIELD_EXPIRES_AT.to_string(), json!(expires_at));
            fields.insert(FIELD_ATTEMPTS.to_string(), json!(0));
            fields.insert(FIELD_ATTEMPTS_RESEND.to_string(), json!(resends));

            match self
                .store
                .update(OTP_CHALLENGES, subject_id, fields, Some(record.version))
                .await
            {
                Ok(_) => {
                    info!(expires_at, resends, "Challenge reissued");
                    let email = self.pending_email(subject_id).await;
                    self.deliver(subject_id, email, code, expires_at);
                    return Ok(Issued {
                        expires_at,
                        remaining_resends: self.remaining_resends(resends),
                    });
                }
                Err(StoreError::NotFound { .. }) => continue,
                Err(err) if err.is_conflict() => {
                    debug!("Challenge changed during resend, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(contention(OTP_CHALLENGES, subject_id))
    }

    async fn pending_email(&self, subject_id: &str) -> Option<String> {
        match self.store.get(PENDING_REGISTRATIONS, subject_id).await {
            Ok(Some(record)) => from_fields::<PendingRegistration>(&record.fields)
                .ok()
                .map(|pending| pending.email),
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to load delivery address: {err}");
                None
            }
        }
    }

    /// Hand the code to the sender. A failed delivery leaves the stored
    /// challenge in place; the subject can resend once the code expires.
    fn deliver(&self, subject_id: &str, email: Option<String>, code: String, expires_at: i64) {
        let delivery = OtpDelivery {
            subject_id: subject_id.to_string(),
            email,
            code,
            expires_at,
        };
        if let Err(err) = self.sender.send(&delivery) {
            error!("Failed to deliver OTP: {err}");
        }
    }
}
